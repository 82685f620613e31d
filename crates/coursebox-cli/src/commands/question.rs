//! Question command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use coursebox_core::{
    ChangeAction, ChangeLog, CoursewareRepo, EntityType, NewQuestion, QuestionRepo, Store,
};

use crate::output::Output;

/// One question in a `question replace` input file
#[derive(Debug, Deserialize)]
struct QuestionSpec {
    #[serde(default)]
    id: Option<String>,
    question_type: String,
    #[serde(default)]
    order_index: Option<i64>,
    #[serde(default)]
    media_paths: Vec<String>,
    #[serde(default)]
    ocr_text: Option<String>,
    #[serde(default)]
    options: Value,
    #[serde(default)]
    answer: Value,
    #[serde(default)]
    annotation: Value,
}

impl QuestionSpec {
    fn into_new_question(self, courseware_id: &str) -> NewQuestion {
        NewQuestion {
            id: self.id,
            courseware_id: courseware_id.to_string(),
            order_index: self.order_index,
            question_type: self.question_type,
            media_paths: self.media_paths,
            ocr_text: self.ocr_text,
            options: self.options,
            answer: self.answer,
            annotation: self.annotation,
        }
    }
}

fn parse_blob(label: &str, raw: Option<String>) -> Result<Value> {
    match raw {
        None => Ok(Value::Null),
        Some(s) => {
            serde_json::from_str(&s).with_context(|| format!("Invalid JSON for --{}", label))
        }
    }
}

fn ensure_courseware(store: &Store, courseware_id: &str) -> Result<()> {
    if CoursewareRepo::new(store).get(courseware_id)?.is_none() {
        bail!("Courseware not found: {}", courseware_id);
    }
    Ok(())
}

/// Add a question to a courseware
#[allow(clippy::too_many_arguments)]
pub fn add(
    store: &Store,
    courseware_id: String,
    question_type: String,
    order: Option<i64>,
    media: Vec<String>,
    ocr_text: Option<String>,
    options: Option<String>,
    answer: Option<String>,
    output: &Output,
) -> Result<()> {
    ensure_courseware(store, &courseware_id)?;

    let mut input = NewQuestion::new(&courseware_id, question_type);
    input.order_index = order;
    input.media_paths = media;
    input.ocr_text = ocr_text;
    input.options = parse_blob("options", options)?;
    input.answer = parse_blob("answer", answer)?;

    let question = QuestionRepo::new(store).create(input)?;
    ChangeLog::new(store).record(EntityType::Question, &question.id, ChangeAction::Create)?;

    output.print_questions(std::slice::from_ref(&question));
    Ok(())
}

/// List the questions of a courseware
pub fn list(store: &Store, courseware_id: String, output: &Output) -> Result<()> {
    ensure_courseware(store, &courseware_id)?;
    let questions = QuestionRepo::new(store).list_for_courseware(&courseware_id)?;
    output.print_questions(&questions);
    Ok(())
}

/// Replace a courseware's entire question set from a JSON file
pub fn replace(
    store: &Store,
    courseware_id: String,
    file: PathBuf,
    output: &Output,
) -> Result<()> {
    ensure_courseware(store, &courseware_id)?;

    let content = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read questions file: {:?}", file))?;
    let specs: Vec<QuestionSpec> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse questions file: {:?}", file))?;

    let items = specs
        .into_iter()
        .map(|spec| spec.into_new_question(&courseware_id))
        .collect();
    let result = QuestionRepo::new(store).replace_for_courseware(&courseware_id, items)?;

    // Track the removed questions as deletes, the new set as creates
    let log = ChangeLog::new(store);
    for removed_id in &result.removed_ids {
        log.record(EntityType::Question, removed_id, ChangeAction::Delete)?;
    }
    for question in &result.questions {
        log.record(EntityType::Question, &question.id, ChangeAction::Create)?;
    }

    output.success(&format!(
        "Replaced {} question(s) with {}",
        result.removed_ids.len(),
        result.questions.len()
    ));
    output.print_questions(&result.questions);
    Ok(())
}

/// Reorder a courseware's questions by the given id sequence
pub fn reorder(
    store: &Store,
    courseware_id: String,
    ids: Vec<String>,
    output: &Output,
) -> Result<()> {
    ensure_courseware(store, &courseware_id)?;

    let reordered = QuestionRepo::new(store).reorder(&courseware_id, &ids)?;

    let log = ChangeLog::new(store);
    for question in reordered.iter().filter(|q| ids.contains(&q.id)) {
        log.record(EntityType::Question, &question.id, ChangeAction::Update)?;
    }

    output.print_questions(&reordered);
    Ok(())
}

/// Delete a question
pub fn delete(store: &Store, id: String, output: &Output) -> Result<()> {
    if !QuestionRepo::new(store).delete(&id)? {
        bail!("Question not found: {}", id);
    }
    ChangeLog::new(store).record(EntityType::Question, &id, ChangeAction::Delete)?;

    output.success(&format!("Deleted question {}", id));
    Ok(())
}
