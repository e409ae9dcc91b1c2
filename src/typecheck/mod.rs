pub mod infer;
pub mod types;
pub mod unify;

pub use infer::check;
