pub(crate) mod assessments;
pub(crate) mod attempts;
pub(crate) mod categories;
pub(crate) mod chat_facts;
pub(crate) mod chat_messages;
pub(crate) mod health;
pub(crate) mod questions;
pub(crate) mod reports;
pub(crate) mod results;
pub(crate) mod users;
