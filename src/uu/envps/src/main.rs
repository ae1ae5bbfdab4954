uucore::bin!(uu_envps);
