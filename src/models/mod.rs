pub mod chama;
pub mod contribution;
pub mod finance;
pub mod member;
pub mod vote;

pub use chama::*;
pub use contribution::*;
pub use finance::*;
pub use member::*;
pub use vote::*;
