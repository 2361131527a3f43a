pub mod employee;
pub mod ffp;
pub mod role;
pub mod salary;
pub mod user;
pub mod vacation;
