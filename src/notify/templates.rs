//! Email subjects and bodies.
//!
//! Bodies render through askama, which escapes every field. Announcement
//! content is the one exception: it is rich text written by staff with
//! ManageAnnouncements and is inserted as HTML. Member-written text (prayer
//! items, volunteer descriptions, names) is always escaped.

use askama::Template;
use chrono::NaiveDate;

use crate::errors::AppError;
use crate::models::{
    Announcement, PrayerItem, PrayerKind, ServiceAssignment, UserProfile, VolunteerOpportunity,
};

/// A rendered message: subject line and HTML body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub html: String,
}

/// Plain text split into paragraphs on blank lines, then into lines.
fn paragraphs(text: &str) -> Vec<Vec<&str>> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.lines().map(str::trim_end).collect())
        .collect()
}

#[derive(Template)]
#[template(path = "email/announcement.html")]
struct AnnouncementEmail<'a> {
    title: &'a str,
    content: &'a str,
    author_name: &'a str,
}

#[derive(Template)]
#[template(path = "email/prayer.html")]
struct PrayerEmail<'a> {
    title: &'a str,
    paragraphs: Vec<Vec<&'a str>>,
    author_name: &'a str,
}

#[derive(Template)]
#[template(path = "email/opportunity.html")]
struct OpportunityEmail<'a> {
    title: &'a str,
    starts_at: &'a str,
    location: Option<&'a str>,
    paragraphs: Vec<Vec<&'a str>>,
    max_volunteers: Option<i64>,
}

#[derive(Template)]
#[template(path = "email/account_approved.html")]
struct AccountApprovedEmail<'a> {
    display_name: &'a str,
}

#[derive(Template)]
#[template(path = "email/service_assignment.html")]
struct ServiceAssignmentEmail<'a> {
    user_name: &'a str,
    role: &'a str,
    week: String,
}

#[derive(Template)]
#[template(path = "email/digest.html")]
struct DigestEmail<'a> {
    announcements: &'a [Announcement],
}

pub fn announcement(item: &Announcement) -> Result<Rendered, AppError> {
    let html = AnnouncementEmail {
        title: &item.title,
        content: &item.content,
        author_name: &item.author_name,
    }
    .render()?;

    Ok(Rendered {
        subject: format!("Announcement: {}", item.title),
        html,
    })
}

/// Body for an approved prayer item; the caller passes the redacted item.
pub fn prayer(item: &PrayerItem) -> Result<Rendered, AppError> {
    let label = match item.kind {
        PrayerKind::Prayer => "Prayer request",
        PrayerKind::Praise => "Praise report",
    };
    let html = PrayerEmail {
        title: &item.title,
        paragraphs: paragraphs(&item.content),
        author_name: &item.author_name,
    }
    .render()?;

    Ok(Rendered {
        subject: format!("{}: {}", label, item.title),
        html,
    })
}

pub fn opportunity(item: &VolunteerOpportunity) -> Result<Rendered, AppError> {
    let html = OpportunityEmail {
        title: &item.title,
        starts_at: &item.starts_at,
        location: item.location.as_deref(),
        paragraphs: paragraphs(&item.description),
        max_volunteers: item.max_volunteers,
    }
    .render()?;

    Ok(Rendered {
        subject: format!("Volunteers needed: {}", item.title),
        html,
    })
}

pub fn account_approved(profile: &UserProfile) -> Result<Rendered, AppError> {
    let html = AccountApprovedEmail {
        display_name: &profile.display_name,
    }
    .render()?;

    Ok(Rendered {
        subject: "Your account has been approved".to_string(),
        html,
    })
}

pub fn service_assignment(assignment: &ServiceAssignment) -> Result<Rendered, AppError> {
    let week = assignment.week_start.format("%B %-d, %Y").to_string();
    let html = ServiceAssignmentEmail {
        user_name: &assignment.user_name,
        role: &assignment.role,
        week: week.clone(),
    }
    .render()?;

    Ok(Rendered {
        subject: format!("You're scheduled: {} on {}", assignment.role, week),
        html,
    })
}

/// Weekly roundup of recent announcements; `None` when there is nothing to send.
pub fn digest(week_of: NaiveDate, announcements: &[Announcement]) -> Result<Option<Rendered>, AppError> {
    if announcements.is_empty() {
        return Ok(None);
    }

    let html = DigestEmail { announcements }.render()?;
    Ok(Some(Rendered {
        subject: format!("This week at church: {}", week_of.format("%B %-d")),
        html,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApprovalStatus, ContentStatus};

    fn announcement_fixture(title: &str) -> Announcement {
        Announcement {
            id: "a1".to_string(),
            title: title.to_string(),
            content: "<p>Bring a dish &amp; a chair</p>".to_string(),
            category: None,
            author_id: "u1".to_string(),
            author_name: "Pastor Ann".to_string(),
            status: ContentStatus::Active,
            created_at: String::new(),
            updated_at: String::new(),
            version: 1,
        }
    }

    #[test]
    fn test_announcement_content_is_rich_text() {
        let rendered = announcement(&announcement_fixture("Picnic <Saturday>")).unwrap();
        assert_eq!(rendered.subject, "Announcement: Picnic <Saturday>");
        assert!(rendered.html.contains("Picnic &lt;Saturday&gt;"));
        assert!(rendered.html.contains("<p>Bring a dish &amp; a chair</p>"));
    }

    #[test]
    fn test_prayer_text_is_escaped_with_line_breaks() {
        let item = PrayerItem {
            id: "p1".to_string(),
            title: "Surgery".to_string(),
            content: "Pray for <Tom>\nat noon\n\nThanks & amen".to_string(),
            kind: PrayerKind::Prayer,
            author_id: None,
            author_name: "Anonymous".to_string(),
            anonymous: true,
            status: ContentStatus::Active,
            approval: ApprovalStatus::Approved,
            created_at: String::new(),
            updated_at: String::new(),
            version: 1,
        };

        let rendered = prayer(&item).unwrap();
        assert_eq!(rendered.subject, "Prayer request: Surgery");
        assert!(rendered.html.contains("<p>Pray for &lt;Tom&gt;<br>at noon</p>"));
        assert!(rendered.html.contains("<p>Thanks &amp; amen</p>"));
        assert!(!rendered.html.contains("<Tom>"));
    }

    #[test]
    fn test_paragraph_split() {
        assert_eq!(
            paragraphs("one\ntwo\n\n\n\nthree"),
            vec![vec!["one", "two"], vec!["three"]]
        );
        assert!(paragraphs("   ").is_empty());
    }

    #[test]
    fn test_empty_digest_is_skipped() {
        let week = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        assert!(digest(week, &[]).unwrap().is_none());

        let rendered = digest(week, &[announcement_fixture("Picnic")])
            .unwrap()
            .unwrap();
        assert_eq!(rendered.subject, "This week at church: June 2");
        assert!(rendered.html.contains("<strong>Picnic</strong>"));
        assert!(rendered.html.contains("<p>Bring a dish &amp; a chair</p>"));
    }
}
