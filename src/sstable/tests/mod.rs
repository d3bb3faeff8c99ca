pub mod helpers;

mod tests_writer;
