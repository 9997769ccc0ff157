//! A client for the Basecamp Classic XML API

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use reqwest::{Method, StatusCode};
use roxmltree::Node;

use crate::error::{KarmError, Result};
use crate::remote::{NewTimeEntry, Person, Project, RemoteService, TaskItem, TaskList, TimeEntry, TimeEntryTarget};
use crate::resource::Resource;
use crate::task::TaskId;


/// A [`RemoteService`] that talks to a Basecamp account
pub struct BasecampClient {
    account: Resource,
    http: reqwest::Client,
}

impl BasecampClient {
    /// Create a client. This does not start a connection
    pub fn new(account: Resource) -> Self {
        Self {
            account,
            http: reqwest::Client::new(),
        }
    }

    pub fn account(&self) -> &Resource {
        &self.account
    }

    async fn request(&self, method: Method, path: &str, body: Option<String>) -> Result<reqwest::Response> {
        let target = self.account.combine(path);
        log::trace!("{} {}", method, target.url());

        let mut request = self.http
            .request(method, target.url().clone())
            .header(ACCEPT, "application/xml")
            .basic_auth(target.username(), Some(target.password()));
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/xml")
                .body(body);
        }
        let response = request.send().await?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => Err(KarmError::Authentication(format!(
                "{} rejected the credentials of user {:?}", self.account.url(), self.account.username()
            ))),
            status => Err(KarmError::Remote(format!("Unexpected HTTP status code {:?} for {}", status, target.url()))),
        }
    }

    async fn get_xml(&self, path: &str) -> Result<String> {
        let response = self.request(Method::GET, path, None).await?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl RemoteService for BasecampClient {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        let text = self.get_xml("/projects.xml").await?;
        parse_projects(&text)
    }

    async fn list_task_lists(&self) -> Result<Vec<TaskList>> {
        let text = self.get_xml("/todo_lists.xml").await?;
        parse_task_lists(&text)
    }

    async fn list_time_entries_for_task(&self, task_id: &TaskId) -> Result<Vec<TimeEntry>> {
        let text = self.get_xml(&format!("/todo_items/{}/time_entries.xml", task_id)).await?;
        parse_time_entries(&text)
    }

    async fn create_time_entry(&mut self, entry: &NewTimeEntry) -> Result<TimeEntry> {
        let path = match &entry.target {
            TimeEntryTarget::Project(id) => format!("/projects/{}/time_entries.xml", id),
            TimeEntryTarget::TaskItem(id) => format!("/todo_items/{}/time_entries.xml", id),
        };
        let response = self.request(Method::POST, &path, Some(time_entry_body(entry))).await?;
        let id = id_from_location(&response)?;

        Ok(TimeEntry {
            id,
            hours: entry.hours,
            date: Some(entry.date),
            person_id: Some(entry.person_id.clone()),
            description: entry.description.clone(),
        })
    }

    async fn create_task_item(&mut self, list_id: &TaskId, content: &str) -> Result<TaskItem> {
        let body = format!(
            "<todo-item><content>{}</content><notify type=\"boolean\">true</notify></todo-item>",
            escape_xml(content)
        );
        let response = self.request(Method::POST, &format!("/todo_lists/{}/todo_items.xml", list_id), Some(body)).await?;
        let id = id_from_location(&response)?;

        Ok(TaskItem {
            id,
            content: content.to_string(),
            completed: false,
        })
    }

    async fn complete_task_item(&mut self, task_id: &TaskId) -> Result<()> {
        self.request(Method::PUT, &format!("/todo_items/{}/complete.xml", task_id), Some(String::new())).await?;
        Ok(())
    }

    async fn get_authenticated_user(&self) -> Result<Option<Person>> {
        let text = self.get_xml("/me.xml").await?;
        parse_person(&text)
    }
}


fn time_entry_body(entry: &NewTimeEntry) -> String {
    format!(
        "<time-entry>\
            <person-id>{}</person-id>\
            <date>{}</date>\
            <hours>{:.2}</hours>\
            <description>{}</description>\
        </time-entry>",
        escape_xml(entry.person_id.as_str()),
        entry.date.format("%Y-%m-%d"),
        entry.hours,
        escape_xml(&entry.description),
    )
}

/// Newly created resources are only known by the URL the service redirects to, e.g. `/todo_items/1234.xml`
fn id_from_location(response: &reqwest::Response) -> Result<TaskId> {
    let location = response.headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| KarmError::Remote(format!("No Location in these response headers: {:?}", response.headers())))?;
    parse_location_id(location)
        .ok_or_else(|| KarmError::Remote(format!("Unable to find a resource id in location {:?}", location)))
}

fn parse_location_id(location: &str) -> Option<TaskId> {
    let last = location.trim_end_matches('/').rsplit('/').next()?;
    let id = last.strip_suffix(".xml").unwrap_or(last);
    if id.is_empty() {
        None
    } else {
        Some(TaskId::from(id))
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}


fn parse_document(text: &str) -> Result<roxmltree::Document<'_>> {
    roxmltree::Document::parse(text)
        .map_err(|err| KarmError::Remote(format!("Unable to parse the XML reply: {}", err)))
}

/// Direct children with the given name. Nested records also have `<id>`s, so descendants cannot be used here
fn children_named<'a, 'input: 'a>(node: Node<'a, 'input>, name: &'a str) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| n.tag_name().name() == name)
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.tag_name().name() == name)
        .and_then(|n| n.text())
        .map(str::trim)
}

fn required_text<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str> {
    child_text(node, name)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| KarmError::Remote(format!("<{}> has no <{}>", node.tag_name().name(), name)))
}

fn parse_projects(text: &str) -> Result<Vec<Project>> {
    let doc = parse_document(text)?;
    children_named(doc.root_element(), "project")
        .map(|node| -> Result<Project> {
            Ok(Project {
                id: TaskId::from(required_text(node, "id")?),
                name: child_text(node, "name").unwrap_or_default().to_string(),
            })
        })
        .collect()
}

fn parse_task_lists(text: &str) -> Result<Vec<TaskList>> {
    let doc = parse_document(text)?;
    let mut lists = Vec::new();
    for node in children_named(doc.root_element(), "todo-list") {
        let mut items = Vec::new();
        for container in children_named(node, "todo-items") {
            for item in children_named(container, "todo-item") {
                items.push(TaskItem {
                    id: TaskId::from(required_text(item, "id")?),
                    content: child_text(item, "content").unwrap_or_default().to_string(),
                    completed: child_text(item, "completed") == Some("true"),
                });
            }
        }

        lists.push(TaskList {
            id: TaskId::from(required_text(node, "id")?),
            name: child_text(node, "name").unwrap_or_default().to_string(),
            project_id: TaskId::from(required_text(node, "project-id")?),
            items,
        });
    }
    Ok(lists)
}

fn parse_time_entries(text: &str) -> Result<Vec<TimeEntry>> {
    let doc = parse_document(text)?;
    children_named(doc.root_element(), "time-entry")
        .map(|node| -> Result<TimeEntry> {
            let hours_text = required_text(node, "hours")?;
            let hours = hours_text.parse::<f64>()
                .map_err(|_| KarmError::Remote(format!("invalid amount of hours {:?}", hours_text)))?;
            Ok(TimeEntry {
                id: TaskId::from(required_text(node, "id")?),
                hours,
                date: child_text(node, "date").and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
                person_id: child_text(node, "person-id").filter(|p| !p.is_empty()).map(TaskId::from),
                description: child_text(node, "description").unwrap_or_default().to_string(),
            })
        })
        .collect()
}

fn parse_person(text: &str) -> Result<Option<Person>> {
    let doc = parse_document(text)?;
    let root = doc.root_element();
    if root.tag_name().name() != "person" {
        return Ok(None);
    }
    let id = match child_text(root, "id").filter(|id| !id.is_empty()) {
        None => return Ok(None),
        Some(id) => TaskId::from(id),
    };
    let name = [child_text(root, "first-name"), child_text(root, "last-name")]
        .iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    Ok(Some(Person { id, name }))
}
