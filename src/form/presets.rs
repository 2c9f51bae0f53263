//! Config forms for the modes that have one.

use std::collections::BTreeMap;

use lerobot_gui_client::{
    endpoints::{Method, config_update_path},
    models::Mode,
};

use super::{
    DirectoryCheck, FieldKind, FieldSpec, FieldValue, FormSchema, OptionsSource, WarnWhen,
};

pub fn schema(mode: Mode) -> Option<FormSchema> {
    match mode {
        Mode::Teleop => Some(teleop()),
        Mode::Record => Some(record()),
        Mode::Eval => Some(eval()),
        Mode::HgDagger => Some(hg_dagger()),
        Mode::Calibrate | Mode::Replay => None,
    }
}

/// Like [`schema`], with the form action replaced where `overrides` has one.
pub fn schema_with_overrides(mode: Mode, overrides: &BTreeMap<Mode, String>) -> Option<FormSchema> {
    let schema = schema(mode)?;
    Some(match overrides.get(&mode) {
        Some(action) => schema.with_action(action.as_str()),
        None => schema,
    })
}

fn base(mode: Mode, label: &str, fields: Vec<FieldSpec>) -> FormSchema {
    FormSchema {
        mode,
        label: label.to_string(),
        action: config_update_path(mode).unwrap_or_default().to_string(),
        method: Method::Post,
        fields,
        directory_check: None,
    }
}

fn robot_config() -> FieldSpec {
    FieldSpec::new("robot_config", FieldKind::Select).with_options(OptionsSource::RobotConfigPaths)
}

fn text(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::Text)
}

fn number(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::Number)
}

fn checkbox(name: &str) -> FieldSpec {
    FieldSpec::new(name, FieldKind::Checkbox)
}

fn root_dir() -> FieldSpec {
    text("root_dir").loaded_from("root")
}

fn image_writers() -> [FieldSpec; 2] {
    [
        number("num_image_writer_processes"),
        number("num_image_writer_threads_per_camera"),
    ]
}

pub fn teleop() -> FormSchema {
    base(
        Mode::Teleop,
        "Teleop",
        vec![
            robot_config(),
            number("fps").with_default(FieldValue::Number(30.0)),
        ],
    )
}

pub fn record() -> FormSchema {
    let mut fields = vec![
        robot_config(),
        root_dir(),
        text("repo_id"),
        FieldSpec::new("tags", FieldKind::Tags),
        number("fps"),
        checkbox("resume"),
        checkbox("local_files_only"),
        checkbox("run_compute_stats"),
        checkbox("push_to_hub"),
        number("episode_time_s"),
        number("num_episodes"),
    ];
    fields.extend(image_writers());
    fields.push(text("single_task"));

    FormSchema {
        // recording into an existing dataset needs `resume`
        directory_check: Some(DirectoryCheck {
            field: "root_dir".to_string(),
            warn_when: WarnWhen::Exists,
        }),
        ..base(Mode::Record, "Record", fields)
    }
}

pub fn eval() -> FormSchema {
    let mut fields = vec![
        robot_config(),
        text("policy_path").loaded_from("pretrained_policy_path"),
        checkbox("record_episodes").loaded_from("record_eval_episodes"),
        checkbox("push_to_hub"),
        root_dir(),
        text("repo_id"),
        FieldSpec::new("tags", FieldKind::Tags),
        number("fps"),
        number("warmup_time_s"),
        number("episode_time_s"),
        number("num_episodes"),
    ];
    fields.extend(image_writers());
    fields.push(text("single_task"));

    base(Mode::Eval, "Eval", fields)
}

pub fn hg_dagger() -> FormSchema {
    let mut fields = vec![
        robot_config(),
        text("policy_path").loaded_from("pretrained_policy_path"),
        root_dir(),
        text("repo_id"),
        number("fps"),
        checkbox("resume"),
        checkbox("local_files_only"),
        checkbox("run_compute_stats"),
        checkbox("push_to_hub"),
        number("num_epochs"),
        number("curr_epoch"),
        number("num_rollouts"),
        number("max_rollout_time_s"),
        number("warmup_time_s"),
        number("reset_time_s"),
    ];
    fields.extend(image_writers());
    fields.push(text("single_task"));

    FormSchema {
        directory_check: Some(DirectoryCheck {
            field: "root_dir".to_string(),
            warn_when: WarnWhen::Missing,
        }),
        ..base(Mode::HgDagger, "HG-DAgger", fields)
    }
}
