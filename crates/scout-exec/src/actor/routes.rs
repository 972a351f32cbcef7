use scout_core::ActorGate;
use scout_model::{Capability, JobArguments, JobType};
use serde_json::{Map, Value, json};

/// How the job query is placed into the actor input.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    /// The query is not forwarded.
    None,
    /// `{field: "query"}`
    Text(String),
    /// `{field: ["query"]}`
    List(String),
    /// `{field: [{"url": "query"}]}`
    UrlList(String),
}

/// One `(job type, capability)` served by an actor.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorRoute {
    pub actor_id: String,
    /// Fixed input fields; job extras and the query are layered on top.
    pub template: Value,
    pub query: QueryInput,
    /// Input field that caps the number of produced items.
    pub limit_field: String,
    /// Query used when probing access.
    pub sample_query: String,
}

impl ActorRoute {
    pub fn new(actor_id: impl Into<String>, template: Value, query: QueryInput, limit_field: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            template,
            query,
            limit_field: limit_field.into(),
            sample_query: "test".into(),
        }
    }

    pub fn with_sample_query(mut self, query: impl Into<String>) -> Self {
        self.sample_query = query.into();
        self
    }

    /// Actor input asking for at most `limit` items in total.
    pub fn build_input(&self, args: &JobArguments, limit: u64) -> Value {
        self.input_for(&args.query, &args.extra, limit)
    }

    pub fn sample_input(&self) -> Value {
        self.input_for(&self.sample_query, &Map::new(), 1)
    }

    fn input_for(&self, query: &str, extra: &Map<String, Value>, limit: u64) -> Value {
        let mut input = match &self.template {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        for (k, v) in extra {
            input.insert(k.clone(), v.clone());
        }
        if !query.is_empty() {
            match &self.query {
                QueryInput::None => {}
                QueryInput::Text(field) => {
                    input.insert(field.clone(), json!(query));
                }
                QueryInput::List(field) => {
                    input.insert(field.clone(), json!([query]));
                }
                QueryInput::UrlList(field) => {
                    input.insert(field.clone(), json!([{ "url": query }]));
                }
            }
        }
        input.insert(self.limit_field.clone(), json!(limit));
        Value::Object(input)
    }
}

/// Routing table from `(job type, capability)` to an actor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorRoutes {
    routes: Vec<(JobType, Capability, ActorRoute)>,
}

impl ActorRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a route.
    pub fn insert(&mut self, job_type: JobType, capability: impl Into<Capability>, route: ActorRoute) {
        let capability = capability.into();
        match self
            .routes
            .iter_mut()
            .find(|(jt, cap, _)| *jt == job_type && *cap == capability)
        {
            Some(slot) => slot.2 = route,
            None => self.routes.push((job_type, capability, route)),
        }
    }

    pub fn with(mut self, job_type: JobType, capability: &str, route: ActorRoute) -> Self {
        self.insert(job_type, capability, route);
        self
    }

    pub fn get(&self, job_type: JobType, capability: &str) -> Option<&ActorRoute> {
        self.routes
            .iter()
            .find(|(jt, cap, _)| *jt == job_type && cap == capability)
            .map(|(_, _, route)| route)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Detection gates: one per `(job type, actor)`, in insertion order.
    pub fn gates(&self) -> Vec<ActorGate> {
        let mut gates: Vec<ActorGate> = Vec::new();
        for (job_type, cap, route) in &self.routes {
            match gates
                .iter_mut()
                .find(|g| g.job_type == *job_type && g.actor_id == route.actor_id)
            {
                Some(gate) => gate.capabilities.push(cap.clone()),
                None => gates.push(ActorGate {
                    actor_id: route.actor_id.clone(),
                    job_type: *job_type,
                    capabilities: vec![cap.clone()],
                    sample_input: route.sample_input(),
                }),
            }
        }
        gates
    }

    /// Routes for the public actors this worker knows how to drive.
    pub fn standard() -> Self {
        const FOLLOWERS: &str = "kaitoeasyapi/premium-x-follower-scraper-following-data";
        const TIKTOK_SEARCH: &str = "clockworks/tiktok-scraper";
        const TIKTOK_TRENDING: &str = "lexis-solutions/tiktok-trending-videos-scraper";
        const REDDIT: &str = "trudax/reddit-scraper";

        let reddit_search = |what: &str| {
            let mut template = json!({
                "searchPosts": false,
                "searchComments": false,
                "searchCommunities": false,
                "searchUsers": false,
                "skipComments": true,
            });
            template[what] = json!(true);
            ActorRoute::new(REDDIT, template, QueryInput::List("searches".into()), "maxItems")
                .with_sample_query("rust")
        };

        Self::new()
            .with(
                JobType::TwitterApify,
                "getfollowers",
                ActorRoute::new(
                    FOLLOWERS,
                    json!({ "getFollowers": true, "getFollowing": false }),
                    QueryInput::List("user_names".into()),
                    "maxFollowers",
                )
                .with_sample_query("x"),
            )
            .with(
                JobType::TwitterApify,
                "getfollowing",
                ActorRoute::new(
                    FOLLOWERS,
                    json!({ "getFollowers": false, "getFollowing": true }),
                    QueryInput::List("user_names".into()),
                    "maxFollowings",
                )
                .with_sample_query("x"),
            )
            .with(
                JobType::Tiktok,
                "searchbyquery",
                ActorRoute::new(
                    TIKTOK_SEARCH,
                    json!({ "shouldDownloadVideos": false }),
                    QueryInput::List("searchQueries".into()),
                    "resultsPerPage",
                ),
            )
            .with(
                JobType::Tiktok,
                "searchbytrending",
                ActorRoute::new(TIKTOK_TRENDING, json!({}), QueryInput::None, "maxItems"),
            )
            .with(
                JobType::Reddit,
                "scrapeurls",
                ActorRoute::new(
                    REDDIT,
                    json!({ "skipComments": false }),
                    QueryInput::UrlList("startUrls".into()),
                    "maxItems",
                )
                .with_sample_query("https://www.reddit.com/r/rust/"),
            )
            .with(JobType::Reddit, "searchposts", reddit_search("searchPosts"))
            .with(JobType::Reddit, "searchusers", reddit_search("searchUsers"))
            .with(JobType::Reddit, "searchcommunities", reddit_search("searchCommunities"))
    }
}
