pub mod plus;
