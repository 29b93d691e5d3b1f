//! Author and leaderboard views across every learner of a course.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use learn_core::dashboard::{
    CourseRoster, LeaderboardSort, LearnerStats, LessonAggregate, OverviewStats,
    sort_leaderboard,
};
use learn_core::model::{CourseId, LearnerId, ProgressSnapshot};
use storage::repository::{
    CourseRepository, EnrollmentRepository, ProgressRepository, StorageError,
};

use crate::api::ApiClient;
use crate::api::wire::{parse_course_progress, parse_enrolled_stats, parse_overview};
use crate::error::ProgressionError;

#[async_trait]
pub trait CourseDashboards: Send + Sync {
    /// One row per enrolled learner, best first.
    ///
    /// # Errors
    ///
    /// Returns a storage error, `Forbidden` when the backend hides other
    /// learners.
    async fn leaderboard(
        &self,
        course_id: CourseId,
        sort: LeaderboardSort,
    ) -> Result<Vec<LearnerStats>, ProgressionError>;

    /// One entry per visible lesson, in course order.
    ///
    /// # Errors
    ///
    /// Returns a storage error, `Forbidden` when the backend hides other
    /// learners.
    async fn lesson_aggregates(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<LessonAggregate>, ProgressionError>;

    /// Totals over `courses`.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    async fn overview(&self, courses: &[CourseId]) -> Result<OverviewStats, ProgressionError>;
}

//
// ─── STORED ────────────────────────────────────────────────────────────────────
//

/// Dashboards computed from raw progress records of a local store.
#[derive(Clone)]
pub struct StoredDashboards {
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl StoredDashboards {
    #[must_use]
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            courses,
            enrollments,
            progress,
        }
    }

    async fn roster(&self, course_id: CourseId) -> Result<CourseRoster, StorageError> {
        let course = self.courses.get_course(course_id).await?;
        let mut by_learner: BTreeMap<LearnerId, ProgressSnapshot> = self
            .enrollments
            .list_learners(course_id)
            .await?
            .into_iter()
            .map(|learner| (learner, ProgressSnapshot::new()))
            .collect();
        for (learner, record) in self.progress.list_course_progress(course_id).await? {
            by_learner.entry(learner).or_default().insert(record);
        }

        let mut roster = CourseRoster::new(course);
        roster.learners = by_learner.into_iter().collect();
        tracing::debug!(course_id = %course_id, learners = roster.learners.len(), "built roster");
        Ok(roster)
    }
}

#[async_trait]
impl CourseDashboards for StoredDashboards {
    async fn leaderboard(
        &self,
        course_id: CourseId,
        sort: LeaderboardSort,
    ) -> Result<Vec<LearnerStats>, ProgressionError> {
        let mut rows = self.roster(course_id).await?.learner_stats();
        sort_leaderboard(&mut rows, sort);
        Ok(rows)
    }

    async fn lesson_aggregates(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<LessonAggregate>, ProgressionError> {
        Ok(self.roster(course_id).await?.lesson_aggregates())
    }

    async fn overview(&self, courses: &[CourseId]) -> Result<OverviewStats, ProgressionError> {
        let mut rosters = Vec::with_capacity(courses.len());
        for course_id in courses {
            rosters.push(self.roster(*course_id).await?);
        }
        Ok(OverviewStats::compute(&rosters))
    }
}

//
// ─── REMOTE ────────────────────────────────────────────────────────────────────
//

/// Dashboards the course API computes server side. The server picks the
/// courses of the authenticated user, so `overview` ignores its argument.
#[derive(Clone)]
pub struct RemoteDashboards {
    client: ApiClient,
}

impl RemoteDashboards {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CourseDashboards for RemoteDashboards {
    async fn leaderboard(
        &self,
        course_id: CourseId,
        sort: LeaderboardSort,
    ) -> Result<Vec<LearnerStats>, ProgressionError> {
        let body = self
            .client
            .get("courses/stats/enrolled")
            .await
            .map_err(StorageError::from)?;
        let mut rows = parse_enrolled_stats(&body, course_id).map_err(StorageError::from)?;
        sort_leaderboard(&mut rows, sort);
        Ok(rows)
    }

    async fn lesson_aggregates(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<LessonAggregate>, ProgressionError> {
        let body = self
            .client
            .get(&format!("student-progress/{course_id}"))
            .await
            .map_err(StorageError::from)?;
        Ok(parse_course_progress(&body, course_id).map_err(StorageError::from)?)
    }

    async fn overview(&self, _courses: &[CourseId]) -> Result<OverviewStats, ProgressionError> {
        let body = self
            .client
            .get("courses/stats")
            .await
            .map_err(StorageError::from)?;
        Ok(parse_overview(&body).map_err(StorageError::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::demo::demo_course;
    use learn_core::dashboard::LearnerRef;
    use learn_core::model::{Enrollment, LessonId, ProgressUpdate, Score};
    use learn_core::time::fixed_now;
    use storage::repository::Storage;

    async fn seeded() -> (Storage, StoredDashboards) {
        let storage = Storage::in_memory();
        let course = demo_course();
        storage.courses.upsert_course(&course, fixed_now()).await.unwrap();
        for id in [1, 2, 3] {
            storage
                .enrollments
                .enroll(&Enrollment::new(LearnerId::new(id), course.id(), fixed_now()))
                .await
                .unwrap();
        }
        let dashboards = StoredDashboards::new(
            Arc::clone(&storage.courses),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.progress),
        );
        (storage, dashboards)
    }

    #[tokio::test]
    async fn idle_learners_still_get_a_row() {
        let (storage, dashboards) = seeded().await;
        let course_id = demo_course().id();
        storage
            .progress
            .upsert_progress(
                LearnerId::new(2),
                course_id,
                LessonId::new(1),
                &ProgressUpdate::completed(),
                fixed_now(),
            )
            .await
            .unwrap();

        let rows = dashboards
            .leaderboard(course_id, LeaderboardSort::Completion)
            .await
            .unwrap();
        let order: Vec<_> = rows.iter().map(|r| r.learner.clone()).collect();
        assert_eq!(
            order,
            vec![
                LearnerRef::Id(LearnerId::new(2)),
                LearnerRef::Id(LearnerId::new(1)),
                LearnerRef::Id(LearnerId::new(3)),
            ]
        );
        assert_eq!(rows[0].stats.completed_lessons, 1);
        assert_eq!(rows[2].stats.completed_lessons, 0);
    }

    #[tokio::test]
    async fn aggregates_cover_every_visible_lesson() {
        let (storage, dashboards) = seeded().await;
        let course_id = demo_course().id();
        storage
            .progress
            .upsert_progress(
                LearnerId::new(1),
                course_id,
                LessonId::new(1),
                &ProgressUpdate::quiz(Score::new(90).unwrap()),
                fixed_now(),
            )
            .await
            .unwrap();

        let lessons = dashboards.lesson_aggregates(course_id).await.unwrap();
        assert_eq!(lessons.len(), demo_course().visible_lessons().count());
        assert!(lessons.iter().all(|l| l.learner_count == 3));
        assert_eq!(lessons[0].quiz_score_percentage, 30);

        let overview = dashboards.overview(&[course_id]).await.unwrap();
        assert_eq!(overview.courses_count, 1);
        assert_eq!(overview.students_count, 3);
        assert_eq!(overview.completed_lessons, 0);
    }

    #[tokio::test]
    async fn unknown_course_is_not_found() {
        let (_, dashboards) = seeded().await;
        let err = dashboards.lesson_aggregates(CourseId::new(404)).await.unwrap_err();
        assert!(matches!(err, ProgressionError::Storage(StorageError::NotFound)));
    }
}
