pub mod compress;
pub mod info;
pub mod shuffle;
