mod assessments;
mod categories;
mod questions;
mod rag;
mod reports;
mod students;

pub(super) use assessments::{
    create_assessment, delete_assessment, duplicate_assessment, get_assessment, link_question,
    list_assessments, set_assessment_status, unlink_question, update_assessment,
};
pub(super) use categories::{create_category, list_categories};
pub(super) use questions::{
    create_question, delete_question, get_question, list_questions, update_question,
};
pub(super) use rag::sync_knowledge;
pub(super) use reports::{
    assessment_report, category_report, export_results, overview, question_report,
    student_report,
};
pub(super) use students::{
    approve_student, bulk_approve, bulk_reject, get_student, list_students, reject_student,
};
