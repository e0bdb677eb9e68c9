//! Shopper-side state for any front-end shell: cart, wishlist, session,
//! checkout, and the HTTP client they use to reach the API.

pub mod api_client;
pub mod cart;
pub mod checkout;
pub mod session;
pub mod storage;
pub mod wishlist;

pub use api_client::{ApiClientError, HttpStorefrontApi, StorefrontApi};
pub use cart::CartStore;
pub use checkout::{Checkout, CheckoutError, CheckoutQuote, CheckoutStep, GatewayReturn};
pub use session::SessionStore;
pub use storage::{DurableStorage, FileStorage, MemoryStorage, StorageError};
pub use wishlist::WishlistStore;
