use std::fs;
use std::path::Path;

use crate::quiz::error::QuizError;

/// Section markers that may appear inside a poem's description.
/// The renderer starts a new paragraph at each of them.
const DESCRIPTION_SECTIONS: [&str; 3] = ["【出典】", "【背景・情景】", "【文学的ポイント】"];

/// One poem of the Hyakunin Isshu: the two halves of the verse,
/// their kana readings, the poet and a free-text commentary.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PoemRecord {
    pub id: u32,
    pub upper: String,
    pub lower: String,
    pub reading_upper: String,
    pub reading_lower: String,
    pub author: String,
    pub description: String,
}

impl PoemRecord {
    /// The commentary with a blank line inserted before each section marker,
    /// ready to be sent as one message.
    pub fn formatted_description(&self) -> String {
        let mut text = self.description.trim().to_string();
        for marker in DESCRIPTION_SECTIONS {
            text = text.replace(marker, &format!("\n\n{marker}"));
        }
        // The first section marker may sit at the very start of the text
        text.trim_start().to_string()
    }
}

/// The full corpus, read once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Poems {
    pub poems: Vec<PoemRecord>,
}

impl Poems {
    /// Loads the corpus from a JSON file (an array of poem records).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, QuizError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| QuizError::NotFound {
            path: path.display().to_string(),
            source,
        })?;
        let poems: Vec<PoemRecord> =
            serde_json::from_str(&raw).map_err(|source| QuizError::Malformed {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self { poems })
    }

    pub fn from_records(poems: Vec<PoemRecord>) -> Self {
        Self { poems }
    }

    pub fn len(&self) -> usize {
        self.poems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poems.is_empty()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.poems.iter().map(|p| p.id).collect()
    }

    pub fn by_id(&self, id: u32) -> Option<&PoemRecord> {
        self.poems.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PoemRecord> {
        self.poems.iter()
    }
}
