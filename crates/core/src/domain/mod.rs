pub mod company;
pub mod input;
