pub mod employee;
pub mod ffp;
pub mod salary;
pub mod vacation;
