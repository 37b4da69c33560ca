//! Capture source classification
//!
//! Maps OS window titles of OBS projectors onto the monitoring slot they
//! show. Projector titles are localized by OBS ("Windowed Projector
//! (Program)", "Proiettore - Anteprima"), so Program/Preview are recognized
//! by a marker list per language. A marker has to be a whole title segment,
//! either a parenthesized group or a part between " - " separators, so a
//! scene projector like "Proiettore - Sorgente: Programma Mattina" is not
//! mistaken for the Program projector. Scene names are operator-authored
//! and are matched verbatim.

use serde::Serialize;
use std::fmt;

/// Title segments meaning "Program"
const PROGRAM_MARKERS: &[&str] = &[
    "program",
    "programma",
    "programm",
    "programa",
    "programme",
    "programo",
];

/// Title segments meaning "Preview"
const PREVIEW_MARKERS: &[&str] = &[
    "preview",
    "anteprima",
    "vorschau",
    "aperçu",
    "apercu",
    "vista previa",
    "vista prévia",
    "pré-visualização",
    "podgląd",
];

/// A window or screen region that can be captured. Supplied fresh by each
/// discovery poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSourceDescriptor {
    /// Opaque platform handle
    pub id: String,
    pub raw_name: String,
}

impl CaptureSourceDescriptor {
    pub fn new(id: impl Into<String>, raw_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_name: raw_name.into(),
        }
    }
}

/// Logical monitoring slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "scene", rename_all = "camelCase")]
pub enum ProjectorSlot {
    Program,
    Preview,
    Scene(String),
}

impl fmt::Display for ProjectorSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectorSlot::Program => write!(f, "Program"),
            ProjectorSlot::Preview => write!(f, "Preview"),
            ProjectorSlot::Scene(name) => write!(f, "Scene '{}'", name),
        }
    }
}

/// Outcome for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub source: CaptureSourceDescriptor,
    /// None when the source is unmatched
    pub slot: Option<ProjectorSlot>,
}

/// A slot and the source currently feeding it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub slot: ProjectorSlot,
    pub source: CaptureSourceDescriptor,
}

/// Classify every source against the known scenes. Output order follows
/// input order; each source is classified independently of the others.
pub fn classify(
    sources: &[CaptureSourceDescriptor],
    known_scenes: &[String],
) -> Vec<Classification> {
    sources
        .iter()
        .map(|source| Classification {
            source: source.clone(),
            slot: slot_for(&source.raw_name, known_scenes),
        })
        .collect()
}

/// Reduce classifications to bindings, at most one source per slot. The
/// first source classified into a slot wins.
pub fn bind(classifications: &[Classification]) -> Vec<Binding> {
    let mut bindings: Vec<Binding> = Vec::new();
    for classification in classifications {
        let Some(slot) = &classification.slot else {
            continue;
        };
        if bindings.iter().any(|b| &b.slot == slot) {
            continue;
        }
        bindings.push(Binding {
            slot: slot.clone(),
            source: classification.source.clone(),
        });
    }
    bindings
}

fn slot_for(raw_name: &str, known_scenes: &[String]) -> Option<ProjectorSlot> {
    let name = raw_name.trim();
    let segments = segments(name);

    if has_marker(&segments, PROGRAM_MARKERS) {
        return Some(ProjectorSlot::Program);
    }
    if has_marker(&segments, PREVIEW_MARKERS) {
        return Some(ProjectorSlot::Preview);
    }

    // "<prefix>: <scene>"; scene names may contain colons themselves
    for (idx, _) in name.match_indices(':') {
        let suffix = name[idx + 1..].trim();
        if let Some(scene) = known_scenes.iter().find(|s| s.as_str() == suffix) {
            return Some(ProjectorSlot::Scene(scene.clone()));
        }
    }

    known_scenes
        .iter()
        .filter(|s| !s.is_empty())
        .find(|s| name.contains(s.as_str()))
        .map(|s| ProjectorSlot::Scene(s.clone()))
}

/// Lowercase and collapse whitespace runs to one space
fn fold(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Folded title split at brackets and " - " separators
fn segments(title: &str) -> Vec<String> {
    fold(title)
        .split(['(', ')', '[', ']'])
        .flat_map(|part| part.split(" - "))
        .map(|part| part.trim_matches(|c: char| c.is_whitespace() || c == '-').to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

fn has_marker(segments: &[String], markers: &[&str]) -> bool {
    segments
        .iter()
        .any(|segment| markers.iter().any(|m| *segment == fold(m)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(names: &[&str]) -> Vec<CaptureSourceDescriptor> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| CaptureSourceDescriptor::new(format!("window:{}", i), *n))
            .collect()
    }

    fn scenes(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn slots(result: &[Classification]) -> Vec<Option<ProjectorSlot>> {
        result.iter().map(|c| c.slot.clone()).collect()
    }

    #[test]
    fn test_italian_projector_titles() {
        let result = classify(
            &sources(&[
                "Proiettore - Programma",
                "Proiettore - Anteprima",
                "Proiettore - Sorgente: Scene A",
                "Random Window",
            ]),
            &scenes(&["Scene A", "Scene B"]),
        );
        assert_eq!(
            slots(&result),
            vec![
                Some(ProjectorSlot::Program),
                Some(ProjectorSlot::Preview),
                Some(ProjectorSlot::Scene("Scene A".into())),
                None,
            ]
        );
    }

    #[test]
    fn test_markers_ignore_case_and_spacing() {
        let result = classify(
            &sources(&["  Windowed Projector   (PROGRAM) ", "Projektor  -  Vorschau", "Projecteur (vista   PREVIA)"]),
            &[],
        );
        assert_eq!(
            slots(&result),
            vec![
                Some(ProjectorSlot::Program),
                Some(ProjectorSlot::Preview),
                Some(ProjectorSlot::Preview),
            ]
        );
    }

    #[test]
    fn test_scene_named_like_a_marker_stays_a_scene() {
        let known = scenes(&["Programma Mattina", "Anteprima Ospiti"]);
        let result = classify(
            &sources(&[
                "Proiettore - Sorgente: Programma Mattina",
                "Proiettore - Sorgente: Anteprima Ospiti",
                "Proiettore - Programma",
            ]),
            &known,
        );
        assert_eq!(
            slots(&result),
            vec![
                Some(ProjectorSlot::Scene("Programma Mattina".into())),
                Some(ProjectorSlot::Scene("Anteprima Ospiti".into())),
                Some(ProjectorSlot::Program),
            ]
        );

        let program = bind(&result)
            .into_iter()
            .find(|b| b.slot == ProjectorSlot::Program)
            .unwrap();
        assert_eq!(program.source.id, "window:2");
    }

    #[test]
    fn test_marker_words_inside_a_segment_do_not_count() {
        let result = classify(
            &sources(&["Program Notes - Text Editor", "Windowed Projector (Preview Cam)"]),
            &[],
        );
        assert_eq!(slots(&result), vec![None, None]);
    }

    #[test]
    fn test_colon_suffix_is_exact_and_case_sensitive() {
        let known = scenes(&["Scene A", "Cam: Wide"]);
        let result = classify(
            &sources(&[
                "Windowed Projector (Source) - Source: scene a",
                "Projector - Source: Cam: Wide",
            ]),
            &known,
        );
        assert_eq!(
            slots(&result),
            vec![None, Some(ProjectorSlot::Scene("Cam: Wide".into()))]
        );
    }

    #[test]
    fn test_substring_uses_known_scene_order() {
        let known = scenes(&["Cam", "Cam 2"]);
        let result = classify(&sources(&["Projector Cam 2"]), &known);
        assert_eq!(slots(&result), vec![Some(ProjectorSlot::Scene("Cam".into()))]);
    }

    #[test]
    fn test_empty_scene_names_never_match() {
        let result = classify(&sources(&["Terminal"]), &scenes(&[""]));
        assert_eq!(slots(&result), vec![None]);
    }

    #[test]
    fn test_bind_keeps_first_source_per_slot() {
        let result = classify(
            &sources(&["Projector - Program", "Projector (Program) again", "Other"]),
            &[],
        );
        let bindings = bind(&result);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].slot, ProjectorSlot::Program);
        assert_eq!(bindings[0].source.id, "window:0");
    }
}
