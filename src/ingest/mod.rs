pub mod dir_reader;
