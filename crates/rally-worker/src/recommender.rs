//! Training course suggestions from analysis feedback.

use std::path::Path;

use rally_models::{Course, FeedbackItem, ShotEvent};
use tracing::{debug, info};

use crate::error::{WorkerError, WorkerResult};

/// Suggests courses for the mistakes and last shot seen in a video.
pub trait CourseRecommender: Send + Sync {
    fn recommend(
        &self,
        errors: &[FeedbackItem],
        last_shot: Option<&ShotEvent>,
    ) -> WorkerResult<Vec<Course>>;
}

/// Tag-matching recommender over a fixed course catalog.
#[derive(Debug, Clone)]
pub struct CatalogRecommender {
    courses: Vec<Course>,
    limit: usize,
}

impl Default for CatalogRecommender {
    fn default() -> Self {
        Self::new(default_catalog())
    }
}

impl CatalogRecommender {
    pub fn new(courses: Vec<Course>) -> Self {
        Self { courses, limit: 3 }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Load a JSON array of courses.
    pub async fn from_file(path: &Path) -> WorkerResult<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let courses: Vec<Course> = serde_json::from_str(&raw).map_err(|e| {
            WorkerError::recommendation(format!("invalid catalog {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), courses = courses.len(), "Loaded course catalog");
        Ok(Self::new(courses))
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }
}

impl CourseRecommender for CatalogRecommender {
    fn recommend(
        &self,
        errors: &[FeedbackItem],
        last_shot: Option<&ShotEvent>,
    ) -> WorkerResult<Vec<Course>> {
        let terms: Vec<String> = errors
            .iter()
            .map(|e| e.title.to_lowercase())
            .chain(last_shot.map(|s| s.shot_type.to_lowercase()))
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, &Course)> = self
            .courses
            .iter()
            .map(|course| {
                let score = course
                    .tags
                    .iter()
                    .filter(|tag| terms.iter().any(|t| t.eq_ignore_ascii_case(tag)))
                    .count();
                (score, course)
            })
            .filter(|(score, _)| *score > 0)
            .collect();

        // Stable sort keeps catalog order between equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let picked: Vec<Course> = scored
            .into_iter()
            .take(self.limit)
            .map(|(_, c)| c.clone())
            .collect();
        debug!(terms = terms.len(), picked = picked.len(), "Recommended courses");
        Ok(picked)
    }
}

fn course(id: &str, title: &str, description: &str, tags: &[&str]) -> Course {
    Course {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

/// Built-in catalog keyed on the feedback titles and shot types the stroke
/// rules produce.
pub fn default_catalog() -> Vec<Course> {
    vec![
        course(
            "footwork-101",
            "Ready Position and Footwork",
            "Bend the knees and stay on the balls of your feet between shots.",
            &["straight legs", "narrow base"],
        ),
        course(
            "paddle-ready",
            "Paddle Up, Paddle Ready",
            "Keep the paddle in front of the chest to shorten reaction time.",
            &["paddle low"],
        ),
        course(
            "forehand-drive",
            "Forehand Drive Fundamentals",
            "Turn the shoulders and finish high on the forehand drive.",
            &["forehand"],
        ),
        course(
            "backhand-basics",
            "Backhand Basics",
            "Lead with the elbow and keep the wrist firm through contact.",
            &["backhand"],
        ),
        course(
            "overhead-smash",
            "Overhead Smash",
            "Track the lob with the off hand and contact in front of the body.",
            &["overhead"],
        ),
        course(
            "stance-drills",
            "Athletic Stance Drills",
            "Wide-base split-step drills for balance at the kitchen line.",
            &["narrow base", "straight legs", "backhand"],
        ),
    ]
}
