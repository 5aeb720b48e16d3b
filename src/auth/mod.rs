//! Bearer token authentication

mod token;

pub use token::TokenCodec;
