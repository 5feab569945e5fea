// Entity Models
//
// Each reconcilable entity carries:
// - Stable integer identity assigned by storage
// - An explicit field table (no runtime reflection)
// - A version counter for optimistic concurrency

pub mod client;
pub mod house;
pub mod rented_house;

pub use client::{hash_password, Client, ClientId, ClientPayload};
pub use house::{House, HouseId, HousePayload};
pub use rented_house::{RentalKey, RentedHouse};
