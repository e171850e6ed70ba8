mod assessments;
mod attempts;
mod chat;
mod history;

pub(super) use assessments::{
    get_assessment, get_result, list_assessments, start_assessment, submit_assessment,
};
pub(super) use attempts::{save_answer, submit_attempt};
pub(super) use chat::{chat, chat_health};
pub(super) use history::{analytics, history};
