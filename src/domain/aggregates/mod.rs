//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod user;
pub mod wishlist;

pub use product::{Product, ProductDraft, ProductError, DEFAULT_RATING};
pub use order::{NewOrder, Order, OrderError, OrderLine, OrderStatus, OrderTotals, PaymentMethod, ShippingInfo, CASH_ON_DELIVERY_FEE};
pub use cart::{CartAction, CartItem, CartState};
pub use user::{Role, User};
pub use wishlist::{Wishlist, WishlistItem};
