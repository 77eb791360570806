//! 테스트용 콘텐츠 생성기

use super::{ContentCatalog, Project, ProjectStatus, Publication, SiteProfile};

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn publication(slug: &str, title: &str, tags: &[&str]) -> Publication {
    Publication {
        slug: slug.to_string(),
        url: format!("/publications/{}", slug),
        title: title.to_string(),
        abstract_text: format!("Abstract of {}", title),
        year: 2024,
        venue: "NeurIPS".to_string(),
        doi: None,
        pdf_url: None,
        code_url: None,
        slides_url: None,
        video_url: None,
        tags: strings(tags),
        featured: false,
        body: String::new(),
    }
}

pub(crate) fn project(slug: &str, title: &str, tags: &[&str], stack: &[&str]) -> Project {
    Project {
        slug: slug.to_string(),
        url: format!("/projects/{}", slug),
        title: title.to_string(),
        summary: format!("Summary of {}", title),
        status: ProjectStatus::InProgress,
        role: None,
        stack: strings(stack),
        repo_url: None,
        demo_url: None,
        images: vec![],
        tags: strings(tags),
        featured: false,
        start_date: None,
        end_date: None,
        body: String::new(),
    }
}

pub(crate) fn catalog(publications: Vec<Publication>, projects: Vec<Project>) -> ContentCatalog {
    ContentCatalog::from_parts(publications, projects, SiteProfile::default())
}
