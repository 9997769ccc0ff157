use url::Url;

use crate::error::{KarmError, Result};

/// Just a wrapper around the account URL and credentials
#[derive(Clone)]
pub struct Resource {
    url: Url,
    username: String,
    password: String,
}

impl Resource {
    pub fn new(url: Url, username: String, password: String) -> Self {
        Self { url, username, password }
    }

    /// Parse the account URL, e.g. `https://mycompany.basecamphq.com`
    pub fn parse<S: AsRef<str>>(url: S, username: String, password: String) -> Result<Self> {
        let url = Url::parse(url.as_ref())
            .map_err(|err| KarmError::ArgumentValidation(format!("invalid URL {:?}: {}", url.as_ref(), err)))?;
        if url.cannot_be_a_base() {
            return Err(KarmError::ArgumentValidation(format!("invalid URL {:?}: not an http(s) URL", url.as_str())));
        }
        Ok(Self::new(url, username, password))
    }

    pub fn url(&self) -> &Url { &self.url }
    pub fn username(&self) -> &String { &self.username }
    pub fn password(&self) -> &String { &self.password }

    /// Build a new Resource by keeping the same credentials, scheme and server from `base` but changing the path part
    pub fn combine(&self, new_path: &str) -> Resource {
        let mut built = (*self).clone();
        built.url.set_path(&new_path);
        built
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("url", &self.url.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_keeps_server_and_credentials() {
        let account = Resource::parse("https://acme.basecamphq.com/", "john".into(), "secret".into()).unwrap();
        let projects = account.combine("/projects.xml");
        assert_eq!(projects.url().as_str(), "https://acme.basecamphq.com/projects.xml");
        assert_eq!(projects.username(), "john");
        assert_eq!(projects.password(), "secret");
        assert!(!format!("{:?}", projects).contains("secret"));
    }

    #[test]
    fn invalid_urls_are_argument_errors() {
        assert!(matches!(Resource::parse("not a url", "a".into(), "b".into()), Err(KarmError::ArgumentValidation(_))));
        assert!(matches!(Resource::parse("mailto:john@acme.com", "a".into(), "b".into()), Err(KarmError::ArgumentValidation(_))));
    }
}
