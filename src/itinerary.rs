//! Itinerary assembly and plain-text rendering.

use chrono::NaiveDate;

use crate::attractions::AttractionRecord;
use crate::extract::TripRequest;

const HIGHLIGHT_COUNT: usize = 5;

/// One day of the plan with the attractions assigned to it.
#[derive(Debug, Clone)]
pub struct DayPlan {
    pub day: u32,
    pub date: Option<NaiveDate>,
    pub attractions: Vec<AttractionRecord>,
}

/// A complete trip plan ready for rendering.
#[derive(Debug, Clone)]
pub struct Itinerary {
    pub destination: String,
    pub request: TripRequest,
    pub weather: Option<String>,
    pub days: Vec<DayPlan>,
    pub highlights: Vec<AttractionRecord>,
}

impl Itinerary {
    /// Distribute `attractions` across the requested number of days in rank
    /// order, round-robin, so the best-ranked sights land on the earliest
    /// days.
    pub fn build(
        destination: String,
        request: TripRequest,
        weather: Option<String>,
        attractions: Vec<AttractionRecord>,
    ) -> Self {
        let day_count = request.duration_days.unwrap_or(3).max(1);

        let mut days: Vec<DayPlan> = (0..day_count)
            .map(|i| DayPlan {
                day: i + 1,
                date: request
                    .start_date
                    .and_then(|start| start.checked_add_days(chrono::Days::new(i as u64))),
                attractions: Vec::new(),
            })
            .collect();

        for (i, attraction) in attractions.iter().enumerate() {
            days[i % day_count as usize].attractions.push(attraction.clone());
        }

        let highlights = attractions.into_iter().take(HIGHLIGHT_COUNT).collect();

        Self {
            destination,
            request,
            weather,
            days,
            highlights,
        }
    }

    /// Render the plan as plain text for terminal output.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!("Trip plan: {}\n", self.destination));
        out.push_str(&"=".repeat(11 + self.destination.len()));
        out.push('\n');

        if let (Some(start), Some(end)) = (self.request.start_date, self.request.end_date) {
            out.push_str(&format!("Dates:    {} to {}\n", start, end));
        }
        if let Some(days) = self.request.duration_days {
            out.push_str(&format!("Duration: {} days\n", days));
        }
        if let Some(budget) = self.request.budget {
            out.push_str(&format!("Budget:   ${}\n", budget));
        }
        if let Some(weather) = &self.weather {
            out.push_str(&format!("Weather:  {}\n", weather));
        }

        if !self.highlights.is_empty() {
            out.push_str("\nTop attractions:\n");
            for (i, attraction) in self.highlights.iter().enumerate() {
                out.push_str(&format!(
                    "  {}. {} ({} rating, {} reviews)\n",
                    i + 1,
                    attraction.name,
                    orna(&attraction.rating),
                    orna(&attraction.reviews),
                ));
                if !attraction.link.is_empty() {
                    out.push_str(&format!("     {}\n", attraction.link));
                }
            }
        }

        for day in &self.days {
            match day.date {
                Some(date) => out.push_str(&format!("\nDay {} ({})\n", day.day, date)),
                None => out.push_str(&format!("\nDay {}\n", day.day)),
            }
            if day.attractions.is_empty() {
                out.push_str("  Free day. Explore at your own pace.\n");
                continue;
            }
            for attraction in &day.attractions {
                out.push_str(&format!("  - {}", attraction.name));
                if attraction.category != "N/A" && !attraction.category.is_empty() {
                    out.push_str(&format!(" [{}]", attraction.category));
                }
                out.push('\n');
            }
        }

        out
    }
}

fn orna(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn attraction(name: &str) -> AttractionRecord {
        AttractionRecord {
            name: name.to_string(),
            rating: "4.5".to_string(),
            reviews: "1,000".to_string(),
            ..Default::default()
        }
    }

    fn request(days: u32) -> TripRequest {
        TripRequest {
            destination: Some("Rome".to_string()),
            budget: Some(1200),
            duration_days: Some(days),
            start_date: NaiveDate::from_ymd_opt(2026, 10, 1),
            end_date: NaiveDate::from_ymd_opt(2026, 10, 4),
        }
    }

    #[test]
    fn test_round_robin_assignment() {
        let attractions = vec![
            attraction("A"),
            attraction("B"),
            attraction("C"),
            attraction("D"),
            attraction("E"),
        ];
        let itinerary = Itinerary::build("Rome".to_string(), request(3), None, attractions);

        assert_eq!(itinerary.days.len(), 3);
        // Rank order round-robin: best attraction opens day 1
        assert_eq!(itinerary.days[0].attractions[0].name, "A");
        assert_eq!(itinerary.days[1].attractions[0].name, "B");
        assert_eq!(itinerary.days[2].attractions[0].name, "C");
        assert_eq!(itinerary.days[0].attractions[1].name, "D");
    }

    #[test]
    fn test_day_dates_advance() {
        let itinerary =
            Itinerary::build("Rome".to_string(), request(3), None, vec![attraction("A")]);
        assert_eq!(itinerary.days[0].date, NaiveDate::from_ymd_opt(2026, 10, 1));
        assert_eq!(itinerary.days[2].date, NaiveDate::from_ymd_opt(2026, 10, 3));
    }

    #[test]
    fn test_highlights_capped_at_five() {
        let attractions = (0..8).map(|i| attraction(&format!("A{}", i))).collect();
        let itinerary = Itinerary::build("Rome".to_string(), request(2), None, attractions);
        assert_eq!(itinerary.highlights.len(), 5);
    }

    #[test]
    fn test_render_includes_core_fields() {
        let itinerary = Itinerary::build(
            "Rome".to_string(),
            request(3),
            Some("clear sky, 24°C".to_string()),
            vec![attraction("Colosseum")],
        );
        let text = itinerary.render();
        assert!(text.contains("Trip plan: Rome"));
        assert!(text.contains("Budget:   $1200"));
        assert!(text.contains("clear sky, 24°C"));
        assert!(text.contains("Colosseum"));
        assert!(text.contains("Day 3"));
    }

    #[test]
    fn test_empty_attractions_yields_free_days() {
        let itinerary = Itinerary::build("Rome".to_string(), request(2), None, vec![]);
        let text = itinerary.render();
        assert!(text.contains("Free day"));
        assert!(itinerary.highlights.is_empty());
    }

    #[test]
    fn test_zero_duration_clamped_to_one_day() {
        let mut req = request(1);
        req.duration_days = Some(0);
        let itinerary = Itinerary::build("Rome".to_string(), req, None, vec![attraction("A")]);
        assert_eq!(itinerary.days.len(), 1);
    }
}
