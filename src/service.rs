pub mod ffp;
pub mod notification;
pub mod rollover;
pub mod salary_import;
pub mod vacation;
pub mod workdays;
