uucore::bin!(uu_pwdx);
