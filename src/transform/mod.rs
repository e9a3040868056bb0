pub mod text_splitter;
