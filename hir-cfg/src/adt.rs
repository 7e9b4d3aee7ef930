pub mod arena;

pub use self::arena::Arena;
