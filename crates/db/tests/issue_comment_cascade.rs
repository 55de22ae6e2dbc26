use db::{
    IssuePriority, IssueStatus, IssueTag, IssueUpdate, NewComment, NewIssue, NewProject, Page,
    ProjectType, Repositories,
};
use db_test_fixture::DbFixture;

#[tokio::test]
async fn comments_are_scoped_to_their_issue_and_cascade() -> anyhow::Result<()> {
    let fixture = match DbFixture::from_env() {
        Ok(f) => f,
        Err(err) => {
            eprintln!("skipping comments_are_scoped_to_their_issue_and_cascade: {err}");
            return Ok(());
        }
    };
    let handle = fixture.create("comment_scope").await?;
    let db = handle.database();
    let author = handle.seed_user("author").await?;

    let project = db
        .projects()
        .create(NewProject {
            title: "Scope".into(),
            description: String::new(),
            project_type: ProjectType::Frontend,
            author_id: author.id,
        })
        .await?;

    let mut issues = Vec::new();
    for title in ["first", "second"] {
        issues.push(
            db.issues()
                .create(NewIssue {
                    project_id: project.id,
                    author_id: author.id,
                    assignee_id: Some(author.id),
                    title: title.into(),
                    description: String::new(),
                    tag: IssueTag::Bug,
                    priority: IssuePriority::High,
                    status: IssueStatus::default(),
                })
                .await?,
        );
    }

    let comment = db
        .comments()
        .create(NewComment {
            issue_id: issues[0].id,
            author_id: author.id,
            description: "on first".into(),
        })
        .await?;

    assert_eq!(
        db.comments()
            .list_by_issue(issues[0].id, Page::default())
            .await?
            .len(),
        1
    );
    assert!(db
        .comments()
        .list_by_issue(issues[1].id, Page::default())
        .await?
        .is_empty());
    assert!(db.comments().get(issues[1].id, comment.id).await?.is_none());

    let unassigned = db
        .issues()
        .update(
            project.id,
            issues[0].id,
            IssueUpdate {
                assignee_id: Some(None),
                status: Some(IssueStatus::InProgress),
                ..Default::default()
            },
        )
        .await?
        .expect("issue exists");
    assert_eq!(unassigned.assignee_id, None);
    assert_eq!(unassigned.status, IssueStatus::InProgress);
    assert_eq!(unassigned.tag, IssueTag::Bug);

    assert!(db.projects().delete(project.id).await?);
    let counts = db.stats().entity_counts().await?;
    assert_eq!(counts.projects, 0);
    assert_eq!(counts.issues, 0);
    assert_eq!(counts.comments, 0);
    assert_eq!(counts.users, 1);

    handle.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn removing_contributor_clears_their_assignments() -> anyhow::Result<()> {
    let fixture = match DbFixture::from_env() {
        Ok(f) => f,
        Err(err) => {
            eprintln!("skipping removing_contributor_clears_their_assignments: {err}");
            return Ok(());
        }
    };
    let handle = fixture.create("contrib_unassign").await?;
    let db = handle.database();
    let author = handle.seed_user("author").await?;
    let member = handle.seed_user("member").await?;

    let mut projects = Vec::new();
    for title in ["kept", "left"] {
        let project = db
            .projects()
            .create(NewProject {
                title: title.into(),
                description: String::new(),
                project_type: ProjectType::Backend,
                author_id: author.id,
            })
            .await?;
        let row = db.contributors().add(project.id, member.id).await?;
        let issue = db
            .issues()
            .create(NewIssue {
                project_id: project.id,
                author_id: author.id,
                assignee_id: Some(member.id),
                title: "assigned".into(),
                description: String::new(),
                tag: IssueTag::Task,
                priority: IssuePriority::Low,
                status: IssueStatus::default(),
            })
            .await?;
        projects.push((project, row, issue));
    }

    let (left_project, left_row, left_issue) = &projects[1];
    assert!(db.contributors().remove(left_project.id, left_row.id).await?);

    let cleared = db
        .issues()
        .get(left_project.id, left_issue.id)
        .await?
        .expect("issue survives");
    assert_eq!(cleared.assignee_id, None);

    let (kept_project, _, kept_issue) = &projects[0];
    let untouched = db
        .issues()
        .get(kept_project.id, kept_issue.id)
        .await?
        .expect("issue survives");
    assert_eq!(untouched.assignee_id, Some(member.id));

    assert!(!db.contributors().remove(left_project.id, left_row.id).await?);

    handle.cleanup().await?;
    Ok(())
}
