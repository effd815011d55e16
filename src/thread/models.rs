use serde::Deserialize;

/// Thread metadata as returned by `/<board>/thread/<id>.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThreadResponse {
    pub posts: Vec<Post>,
}

/// A single post. Only the fields needed for archiving are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub no: Option<u64>,
    /// Media timestamp id, used as the stored file name.
    #[serde(default)]
    pub tim: Option<u64>,
    /// File extension including the leading dot.
    #[serde(default)]
    pub ext: Option<String>,
    /// `1` when the attached file was deleted.
    #[serde(default)]
    pub filedeleted: Option<u8>,
    /// File size in bytes as reported by the server.
    #[serde(default)]
    pub fsize: Option<u64>,
    /// Comment body (HTML fragment).
    #[serde(default)]
    pub com: Option<String>,
}

impl Post {
    #[must_use]
    pub fn is_file_deleted(&self) -> bool {
        self.filedeleted == Some(1)
    }

    /// Whether this post carries a downloadable file.
    #[must_use]
    pub fn has_file(&self) -> bool {
        self.ext.is_some() && !self.is_file_deleted()
    }

    /// Stored file name (`<tim><ext>`), if the post has a downloadable file.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        if !self.has_file() {
            return None;
        }
        let tim = self.tim?;
        let ext = self.ext.as_deref()?;
        Some(format!("{tim}{ext}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_thread() {
        let json = r#"{
            "posts": [
                {"no": 1, "tim": 1620000000000, "ext": ".png", "fsize": 5000, "com": "hello", "sticky": 1},
                {"no": 2, "com": "no file"},
                {"no": 3, "filedeleted": 1, "ext": ".jpg", "tim": 1620000000001}
            ]
        }"#;
        let thread: ThreadResponse = serde_json::from_str(json).unwrap();
        assert_eq!(thread.posts.len(), 3);
        assert_eq!(thread.posts[0].filename().as_deref(), Some("1620000000000.png"));
        assert_eq!(thread.posts[0].fsize, Some(5000));
        assert_eq!(thread.posts[1].filename(), None);
        assert!(thread.posts[2].is_file_deleted());
        assert_eq!(thread.posts[2].filename(), None);
    }

    #[test]
    fn test_has_file() {
        let post = Post {
            ext: Some(".webm".to_string()),
            filedeleted: Some(0),
            ..Post::default()
        };
        assert!(post.has_file());
        // No timestamp id: nothing to name the file after
        assert_eq!(post.filename(), None);

        let deleted = Post {
            filedeleted: Some(1),
            ..post
        };
        assert!(!deleted.has_file());
    }
}
