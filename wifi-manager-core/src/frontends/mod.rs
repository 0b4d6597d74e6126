pub mod embed_frontend;

pub use embed_frontend::EmbedFrontend;
