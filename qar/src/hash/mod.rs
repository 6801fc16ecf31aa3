//! Hash algorithms for QAR entry identifiers

pub mod city;
pub mod path;

pub use city::{city_hash64, hash64};
pub use path::{
    entry_hash, extension_key, file_name_key, hash_path, hash_path_without_extension, hash_text,
    string_seed,
};
