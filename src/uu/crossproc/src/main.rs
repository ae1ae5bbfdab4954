uucore::bin!(uu_crossproc);
