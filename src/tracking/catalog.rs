/// Topic users can pick from. The catalog is static, records only reference it by id.
#[derive(Debug, PartialEq, Eq)]
pub struct CatalogTopic {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

const TOPICS: &[CatalogTopic] = &[
    CatalogTopic {
        id: "programming",
        name: "Programming",
        description: "Writing software, solving exercises, building side projects",
    },
    CatalogTopic {
        id: "reading",
        name: "Reading",
        description: "Books, papers and long form articles",
    },
    CatalogTopic {
        id: "languages",
        name: "Languages",
        description: "Learning and practicing a foreign language",
    },
    CatalogTopic {
        id: "music",
        name: "Music",
        description: "Practicing an instrument or singing",
    },
    CatalogTopic {
        id: "fitness",
        name: "Fitness",
        description: "Workouts, running, cycling and other sports",
    },
    CatalogTopic {
        id: "drawing",
        name: "Drawing",
        description: "Sketching, painting and digital art",
    },
    CatalogTopic {
        id: "writing",
        name: "Writing",
        description: "Journaling, blogging and creative writing",
    },
    CatalogTopic {
        id: "meditation",
        name: "Meditation",
        description: "Mindfulness and breathing practice",
    },
];

pub fn all() -> &'static [CatalogTopic] {
    TOPICS
}

pub fn find(topic_id: &str) -> Option<&'static CatalogTopic> {
    TOPICS.iter().find(|v| v.id == topic_id)
}

/// Human readable name of a topic. Unknown ids are shown as is.
pub fn display_name(topic_id: &str) -> &str {
    find(topic_id).map_or(topic_id, |v| v.name)
}
