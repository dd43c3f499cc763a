pub mod config;
pub mod cookies;
pub mod error;
pub mod merchant;
pub mod shop;

pub use config::KaspiConfig;
pub use error::{KaspiError, UpstreamCode};
pub use merchant::{MerchantClient, OfferListQuery};
pub use shop::{DateWindow, ShopClient};
