pub mod alert;
pub mod customer;

pub use alert::Entity as Alert;
pub use customer::Entity as Customer;
