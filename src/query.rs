//! Listing filters and pagination over visible requests
use super::config::Config;
use super::request::{Request, RequestStatus};
use super::visibility::View;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    pub view: View,
    pub status: Option<RequestStatus>,
    /// Case-insensitive text matched against the request code, district,
    /// upazila and blood group.
    pub search: Option<String>,
    /// 1-based, 0 is read as 1.
    pub page: usize,
    pub limit: Option<usize>,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            view: View::Feed,
            status: None,
            search: None,
            page: 1,
            limit: None,
        }
    }
}

impl ListFilter {
    pub fn new(view: View) -> Self {
        Self {
            view,
            ..Self::default()
        }
    }
    pub fn set_status(mut self, status: RequestStatus) -> Self {
        self.status = Some(status);
        self
    }
    pub fn set_search(mut self, text: &str) -> Self {
        let text = text.trim();
        self.search = (!text.is_empty()).then(|| text.to_lowercase());
        self
    }
    pub fn set_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }
    pub fn set_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, request: &Request) -> bool {
        if self.status.is_some_and(|status| request.status() != status) {
            return false;
        }
        match &self.search {
            None => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                let details = request.details();
                [
                    Some(request.request_code()),
                    Some(request.district()),
                    Some(request.upazila()),
                    Some(request.blood_group().label()),
                    details.hospital.as_deref(),
                    details.patient_name.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(needle.as_str()))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matches across all pages.
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.limit.max(1))
    }
    pub fn has_next(&self) -> bool {
        self.page < self.page_count()
    }
}

/// Applies the filter to already-visible requests and cuts out one page.
pub fn paginate(visible: Vec<Request>, filter: &ListFilter, config: &Config) -> Page<Request> {
    let limit = filter
        .limit
        .unwrap_or(config.default_page_limit())
        .clamp(1, config.max_page_limit().max(1));
    let page = filter.page.max(1);

    let matching: Vec<Request> = visible.into_iter().filter(|r| filter.matches(r)).collect();
    let total = matching.len();
    let items = matching
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();

    Page {
        items,
        total,
        page,
        limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::NewRequest;
    use crate::types::{BloodGroup, TimeStamp};

    fn pool() -> Vec<Request> {
        let now = TimeStamp::now();
        (0..25)
            .map(|i| {
                let group = if i % 5 == 0 { BloodGroup::AbNegative } else { BloodGroup::OPositive };
                let upazila = if i < 3 { "Mirpur" } else { "Savar" };
                let mut draft = NewRequest::new()
                    .set_blood_group(group)
                    .set_blood_unit(1)
                    .set_location("Dhaka", upazila);
                if i == 7 {
                    draft = draft.set_hospital("Enam Medical College").set_patient_name("Karim");
                }
                Request::open(format!("req_{i}"), format!("BR-{i:04}"), "r", draft, now).unwrap()
            })
            .collect()
    }

    #[test]
    fn pages_are_cut_with_default_and_clamped_limits() {
        let config = Config::default();

        let first = paginate(pool(), &ListFilter::default(), &config);
        assert_eq!((first.items.len(), first.total, first.limit), (10, 25, 10));
        assert_eq!(first.page_count(), 3);
        assert!(first.has_next());

        let last = paginate(pool(), &ListFilter::default().set_page(3), &config);
        assert_eq!(last.items.len(), 5);
        assert!(!last.has_next());

        let zero = paginate(pool(), &ListFilter::default().set_page(0).set_limit(1000), &config);
        assert_eq!((zero.page, zero.limit, zero.items.len()), (1, 100, 25));
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let config = Config::default();

        let by_place = paginate(pool(), &ListFilter::default().set_search("  MIRPUR "), &config);
        assert_eq!(by_place.total, 3);

        let by_group = paginate(pool(), &ListFilter::default().set_search("ab-"), &config);
        assert_eq!(by_group.total, 5);

        let by_code = paginate(pool(), &ListFilter::default().set_search("br-0012"), &config);
        assert_eq!(by_code.items[0].id(), "req_12");

        let by_hospital = paginate(pool(), &ListFilter::default().set_search("enam medical"), &config);
        assert_eq!(by_hospital.items.iter().map(|r| r.id()).collect::<Vec<_>>(), vec!["req_7"]);
        let by_patient = paginate(pool(), &ListFilter::default().set_search("KARIM"), &config);
        assert_eq!(by_patient.total, 1);

        let by_status = paginate(
            pool(),
            &ListFilter::default().set_status(RequestStatus::Fulfilled),
            &config,
        );
        assert_eq!(by_status.total, 0);
    }
}
