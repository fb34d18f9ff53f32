pub mod export;
pub mod gesture;
pub mod info;
pub mod migrate;
pub mod simulate;
pub mod validate;
