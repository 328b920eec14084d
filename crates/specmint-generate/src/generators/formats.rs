use chrono::{DateTime, Days, Duration, Months, SecondsFormat, Utc};
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};

use specmint_core::StringFormat;

const EMAIL_NAMES: [&str; 7] = ["user", "test", "demo", "sample", "john", "jane", "admin"];
const EMAIL_DOMAINS: [&str; 4] = ["example.com", "test.org", "sample.net", "demo.co"];
const URI_SCHEMES: [&str; 2] = ["http", "https"];
const URI_HOSTS: [&str; 3] = ["example.com", "test.org", "api.sample.net"];
const URI_PATHS: [&str; 4] = ["/api/v1", "/data", "/users", "/items"];

const DATE_WINDOW_MONTHS: u32 = 12 * 5;
const DATE_TIME_WINDOW_MONTHS: u32 = 12;

/// Produce a string in `format`. Dates are anchored to `epoch`; `None` only
/// when the window falls outside the representable calendar.
pub fn generate(format: StringFormat, rng: &mut dyn RngCore, epoch: DateTime<Utc>) -> Option<String> {
    match format {
        StringFormat::Email => Some(email(rng)),
        StringFormat::Uuid => Some(uuid_v4(rng)),
        StringFormat::Date => date(rng, epoch),
        StringFormat::DateTime => date_time(rng, epoch),
        StringFormat::Uri => Some(uri(rng)),
        StringFormat::Phone => Some(phone(rng)),
    }
}

fn pick(rng: &mut dyn RngCore, values: &[&'static str]) -> &'static str {
    values.choose(rng).copied().unwrap_or_default()
}

fn email(rng: &mut dyn RngCore) -> String {
    let name = pick(rng, &EMAIL_NAMES);
    let domain = pick(rng, &EMAIL_DOMAINS);
    let suffix = rng.random_range(0..1000);
    format!("{name}{suffix}@{domain}")
}

fn uuid_v4(rng: &mut dyn RngCore) -> String {
    let mut bytes = [0_u8; 16];
    rng.fill_bytes(&mut bytes);
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    uuid::Uuid::from_bytes(bytes).to_string()
}

fn date(rng: &mut dyn RngCore, epoch: DateTime<Utc>) -> Option<String> {
    let end = epoch.date_naive();
    let start = end.checked_sub_months(Months::new(DATE_WINDOW_MONTHS))?;
    let span = u64::try_from((end - start).num_days()).ok()?.max(1);
    let day = start.checked_add_days(Days::new(rng.random_range(0..span)))?;
    Some(day.format("%Y-%m-%d").to_string())
}

fn date_time(rng: &mut dyn RngCore, epoch: DateTime<Utc>) -> Option<String> {
    let start = epoch.checked_sub_months(Months::new(DATE_TIME_WINDOW_MONTHS))?;
    let span = (epoch - start).num_seconds().max(1);
    let instant = start.checked_add_signed(Duration::seconds(rng.random_range(0..span)))?;
    Some(instant.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn uri(rng: &mut dyn RngCore) -> String {
    let scheme = pick(rng, &URI_SCHEMES);
    let host = pick(rng, &URI_HOSTS);
    let path = pick(rng, &URI_PATHS);
    let id = rng.random_range(0..10_000);
    format!("{scheme}://{host}{path}/{id}")
}

fn phone(rng: &mut dyn RngCore) -> String {
    let area = rng.random_range(200..1000);
    let exchange = rng.random_range(200..1000);
    let number = rng.random_range(0..10_000);
    format!("({area:03}) {exchange:03}-{number:04}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::seeded_rng;
    use chrono::{NaiveDate, TimeZone};

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("valid epoch")
    }

    #[test]
    fn uuid_sets_version_and_variant() {
        let mut rng = seeded_rng(5);
        let value = uuid_v4(&mut rng);
        let parsed = uuid::Uuid::parse_str(&value).expect("uuid");
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(parsed.get_variant(), uuid::Variant::RFC4122);
    }

    #[test]
    fn dates_stay_inside_their_windows() {
        let lower = NaiveDate::from_ymd_opt(2019, 1, 1).expect("date");
        let upper = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        for seed in 0..200 {
            let mut rng = seeded_rng(seed);
            let value = date(&mut rng, epoch()).expect("date");
            let day = NaiveDate::parse_from_str(&value, "%Y-%m-%d").expect("parse date");
            assert!(day >= lower && day < upper, "{value} outside window");

            let value = date_time(&mut rng, epoch()).expect("date-time");
            let instant = DateTime::parse_from_rfc3339(&value)
                .expect("parse date-time")
                .with_timezone(&Utc);
            assert!(instant < epoch() && instant >= epoch() - Duration::days(366));
            assert!(value.ends_with('Z'));
        }
    }

    #[test]
    fn phone_email_and_uri_shapes() {
        let mut rng = seeded_rng(77);
        let phone = phone(&mut rng);
        assert_eq!(phone.len(), "(200) 200-0000".len());
        let area: u32 = phone[1..4].parse().expect("area");
        assert!((200..=999).contains(&area));

        let email = email(&mut rng);
        let (local, domain) = email.split_once('@').expect("email");
        assert!(EMAIL_DOMAINS.iter().any(|known| *known == domain));
        assert!(EMAIL_NAMES.iter().any(|name| local.starts_with(name)));

        let uri = uri(&mut rng);
        assert!(uri.starts_with("http://") || uri.starts_with("https://"));
    }
}
