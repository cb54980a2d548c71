pub mod pidfile;
