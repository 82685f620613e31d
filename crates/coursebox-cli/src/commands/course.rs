//! Courseware command handlers

use anyhow::{bail, Result};

use coursebox_core::{
    ChangeAction, ChangeLog, CoursewarePatch, CoursewareRepo, CoursewareStatus, EntityType,
    NewCourseware, Store,
};

use crate::output::Output;

/// Create a new courseware
pub fn create(
    store: &Store,
    title: String,
    description: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut input = NewCourseware::new(title);
    input.description = description;

    let courseware = CoursewareRepo::new(store).create(input)?;
    ChangeLog::new(store).record(
        EntityType::Courseware,
        &courseware.id,
        ChangeAction::Create,
    )?;

    output.print_courseware(&courseware);
    Ok(())
}

/// List all coursewares
pub fn list(store: &Store, output: &Output) -> Result<()> {
    let coursewares = CoursewareRepo::new(store).list()?;
    output.print_coursewares(&coursewares);
    Ok(())
}

/// Show one courseware with its questions
pub fn show(store: &Store, id: String, output: &Output) -> Result<()> {
    let Some(courseware) = CoursewareRepo::new(store).get(&id)? else {
        bail!("Courseware not found: {}", id);
    };
    output.print_courseware(&courseware);

    let questions = coursebox_core::QuestionRepo::new(store).list_for_courseware(&id)?;
    if !questions.is_empty() && !output.is_quiet() && !output.is_json() {
        println!();
        output.print_questions(&questions);
    }
    Ok(())
}

/// Update courseware fields
pub fn update(
    store: &Store,
    id: String,
    title: Option<String>,
    description: Option<String>,
    status: Option<String>,
    output: &Output,
) -> Result<()> {
    let status = match status.as_deref() {
        None => None,
        Some("draft") => Some(CoursewareStatus::Draft),
        Some("completed") => Some(CoursewareStatus::Completed),
        Some("archived") => Some(CoursewareStatus::Archived),
        Some(other) => bail!(
            "Unknown status: '{}'\nValid values: draft, completed, archived",
            other
        ),
    };
    // "none" or an empty value clears the description
    let description = description.map(|d| {
        if d.is_empty() || d == "none" {
            None
        } else {
            Some(d)
        }
    });

    let patch = CoursewarePatch {
        title,
        description,
        status,
        ..Default::default()
    };
    if patch.is_empty() {
        bail!("Nothing to update. Pass --title, --description or --status.");
    }

    let Some(courseware) = CoursewareRepo::new(store).update(&id, patch)? else {
        bail!("Courseware not found: {}", id);
    };
    ChangeLog::new(store).record(
        EntityType::Courseware,
        &courseware.id,
        ChangeAction::Update,
    )?;

    output.print_courseware(&courseware);
    Ok(())
}

/// Delete a courseware and its questions
pub fn delete(store: &Store, id: String, output: &Output) -> Result<()> {
    let Some(cascaded) = CoursewareRepo::new(store).delete(&id)? else {
        bail!("Courseware not found: {}", id);
    };

    // Track the delete and the cascaded question deletes
    let log = ChangeLog::new(store);
    log.record(EntityType::Courseware, &id, ChangeAction::Delete)?;
    for question_id in &cascaded {
        log.record(EntityType::Question, question_id, ChangeAction::Delete)?;
    }

    output.success(&format!(
        "Deleted courseware {} ({} question(s) removed)",
        id,
        cascaded.len()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use coursebox_core::{NewQuestion, QuestionRepo};
    use tempfile::TempDir;

    fn open_store(temp_dir: &TempDir) -> Store {
        Store::open(temp_dir.path().join("coursebox.db")).unwrap()
    }

    fn quiet_output() -> Output {
        Output::new(OutputFormat::Quiet)
    }

    #[test]
    fn test_create_command_records_pending_create() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);

        create(&store, "Algebra".to_string(), None, &quiet_output()).unwrap();

        let pending = ChangeLog::new(&store).pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].entity_type, EntityType::Courseware);
        assert_eq!(pending[0].action, ChangeAction::Create);
    }

    #[test]
    fn test_delete_command_records_cascaded_question_deletes() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir);

        // Set up through the repos so no pending create records merge with
        // the deletes
        let courseware = CoursewareRepo::new(&store)
            .create(NewCourseware::new("Algebra"))
            .unwrap();
        let questions = QuestionRepo::new(&store);
        let q1 = questions
            .create(NewQuestion::new(&courseware.id, "single_choice"))
            .unwrap();
        let q2 = questions
            .create(NewQuestion::new(&courseware.id, "essay"))
            .unwrap();

        delete(&store, courseware.id.clone(), &quiet_output()).unwrap();

        let pending = ChangeLog::new(&store).pending().unwrap();
        assert_eq!(pending.len(), 3);
        assert!(pending
            .iter()
            .all(|record| record.action == ChangeAction::Delete));
        assert!(pending
            .iter()
            .any(|record| record.entity_id == courseware.id));
        for question_id in [&q1.id, &q2.id] {
            assert!(pending.iter().any(|record| {
                record.entity_type == EntityType::Question && &record.entity_id == question_id
            }));
        }
    }
}
