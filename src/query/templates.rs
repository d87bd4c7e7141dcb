//! The fixed set of analytics queries served by the API.

/// One of the read-only analytics queries.
///
/// Each variant maps to a static, parameterless SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalyticsQuery {
    /// Hourly event counts for the first week of data
    HourlyEvents,
    /// Events summed per day for the first seven days
    DailyEvents,
    /// Hourly impressions, clicks and revenue for the first week of data
    HourlyStats,
    /// Impressions, clicks and revenue summed per day for the first seven days
    DailyStats,
    /// Every point of interest
    PointsOfInterest,
}

impl AnalyticsQuery {
    /// All queries, in route order.
    pub const ALL: [AnalyticsQuery; 5] = [
        AnalyticsQuery::HourlyEvents,
        AnalyticsQuery::DailyEvents,
        AnalyticsQuery::HourlyStats,
        AnalyticsQuery::DailyStats,
        AnalyticsQuery::PointsOfInterest,
    ];

    /// The HTTP path serving this query.
    pub fn path(&self) -> &'static str {
        match self {
            AnalyticsQuery::HourlyEvents => "/events/hourly",
            AnalyticsQuery::DailyEvents => "/events/daily",
            AnalyticsQuery::HourlyStats => "/stats/hourly",
            AnalyticsQuery::DailyStats => "/stats/daily",
            AnalyticsQuery::PointsOfInterest => "/poi",
        }
    }

    /// The SQL text executed for this query.
    pub fn sql(&self) -> &'static str {
        match self {
            AnalyticsQuery::HourlyEvents => {
                r#"
                SELECT date, hour, events
                FROM public.hourly_events
                ORDER BY date, hour
                LIMIT 168;
                "#
            }
            AnalyticsQuery::DailyEvents => {
                r#"
                SELECT date, SUM(events) AS events
                FROM public.hourly_events
                GROUP BY date
                ORDER BY date
                LIMIT 7;
                "#
            }
            AnalyticsQuery::HourlyStats => {
                r#"
                SELECT date, hour, impressions, clicks, revenue
                FROM public.hourly_stats
                ORDER BY date, hour
                LIMIT 168;
                "#
            }
            AnalyticsQuery::DailyStats => {
                r#"
                SELECT date,
                    SUM(impressions) AS impressions,
                    SUM(clicks) AS clicks,
                    SUM(revenue) AS revenue
                FROM public.hourly_stats
                GROUP BY date
                ORDER BY date
                LIMIT 7;
                "#
            }
            AnalyticsQuery::PointsOfInterest => {
                r#"
                SELECT *
                FROM public.poi;
                "#
            }
        }
    }
}

impl std::fmt::Display for AnalyticsQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_paths_are_unique() {
        let paths: HashSet<_> = AnalyticsQuery::ALL.iter().map(|q| q.path()).collect();
        assert_eq!(paths.len(), AnalyticsQuery::ALL.len());
    }

    #[test]
    fn test_hourly_queries_cover_one_week() {
        assert!(AnalyticsQuery::HourlyEvents.sql().contains("LIMIT 168"));
        assert!(AnalyticsQuery::HourlyStats.sql().contains("LIMIT 168"));
    }

    #[test]
    fn test_daily_queries_cover_seven_days() {
        assert!(AnalyticsQuery::DailyEvents.sql().contains("LIMIT 7"));
        assert!(AnalyticsQuery::DailyStats.sql().contains("GROUP BY date"));
    }
}
