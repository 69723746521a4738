// Read-only geographic lookup collaborator. Display concern only: the core
// never depends on this data being complete or correct.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoPlace {
    pub code: String,
    pub name: String,
}

impl GeoPlace {
    fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}

pub trait GeoLookup: Send + Sync + 'static {
    fn countries(&self) -> Vec<GeoPlace>;
    fn states(&self, country_code: &str) -> Vec<GeoPlace>;
    fn cities(&self, country_code: &str, state_code: &str) -> Vec<String>;

    fn country_name(&self, country_code: &str) -> Option<String> {
        self.countries()
            .into_iter()
            .find(|c| c.code == country_code)
            .map(|c| c.name)
    }

    fn state_name(&self, country_code: &str, state_code: &str) -> Option<String> {
        self.states(country_code)
            .into_iter()
            .find(|s| s.code == state_code)
            .map(|s| s.name)
    }
}

// Small built-in directory, enough for detail pages and tests
pub struct StaticGeoDirectory {
    countries: Vec<(GeoPlace, Vec<(GeoPlace, Vec<String>)>)>,
}

impl Default for StaticGeoDirectory {
    fn default() -> Self {
        Self {
            countries: vec![
                (
                    GeoPlace::new("US", "United States"),
                    vec![
                        (
                            GeoPlace::new("FL", "Florida"),
                            vec!["Miami".to_string(), "Orlando".to_string()],
                        ),
                        (
                            GeoPlace::new("NY", "New York"),
                            vec!["New York City".to_string(), "Buffalo".to_string()],
                        ),
                    ],
                ),
                (
                    GeoPlace::new("GB", "United Kingdom"),
                    vec![(
                        GeoPlace::new("ENG", "England"),
                        vec!["London".to_string(), "Brighton".to_string()],
                    )],
                ),
                (
                    GeoPlace::new("ES", "Spain"),
                    vec![(
                        GeoPlace::new("AN", "Andalusia"),
                        vec!["Seville".to_string(), "Malaga".to_string()],
                    )],
                ),
            ],
        }
    }
}

impl GeoLookup for StaticGeoDirectory {
    fn countries(&self) -> Vec<GeoPlace> {
        self.countries.iter().map(|(c, _)| c.clone()).collect()
    }

    fn states(&self, country_code: &str) -> Vec<GeoPlace> {
        self.countries
            .iter()
            .find(|(c, _)| c.code == country_code)
            .map(|(_, states)| states.iter().map(|(s, _)| s.clone()).collect())
            .unwrap_or_default()
    }

    fn cities(&self, country_code: &str, state_code: &str) -> Vec<String> {
        self.countries
            .iter()
            .find(|(c, _)| c.code == country_code)
            .and_then(|(_, states)| {
                states
                    .iter()
                    .find(|(s, _)| s.code == state_code)
                    .map(|(_, cities)| cities.clone())
            })
            .unwrap_or_default()
    }
}
