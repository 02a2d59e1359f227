pub mod attachment;
pub mod film;
pub mod genre;
pub mod home;
pub mod profile;
pub mod review;

use crate::error::{ApiError, ApiResult};
use garde::Validate;
use mfd_dal::{Batch, ListingParams};
use serde::Serialize;

#[derive(Debug, Clone, Validate, serde::Deserialize)]
#[garde(allow_unvalidated)]
pub struct Paging {
    page: Option<u32>,
    #[garde(range(min = 1, max = 1000))]
    page_size: Option<u32>,
    #[garde(length(max = 255))]
    sort: Option<String>,
}

impl Paging {
    pub fn into_listing_params(self, default_page_size: u32) -> ApiResult<ListingParams> {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self.page_size.unwrap_or(default_page_size);
        // page is client controlled and unbounded, keep the math in i64
        let offset = (page as i64 - 1) * page_size as i64;
        let limit = page_size as i64;
        let order = self
            .sort
            .map(|orderings| {
                orderings
                    .split(',')
                    .map(|name| {
                        let (field_name, descending) = match name.trim() {
                            "" => {
                                return Err(ApiError::InvalidQuery(
                                    "Empty ordering name".to_string(),
                                ));
                            }
                            name if name.len() > 100 => {
                                return Err(ApiError::InvalidQuery(
                                    "Ordering name too long".to_string(),
                                ));
                            }
                            name if name.starts_with('+') => (&name[1..], false),
                            name if name.starts_with('-') => (&name[1..], true),
                            name => (name, false),
                        };

                        let order = if descending {
                            mfd_dal::Order::Desc(field_name.to_string())
                        } else {
                            mfd_dal::Order::Asc(field_name.to_string())
                        };

                        Ok(order)
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        Ok(ListingParams {
            offset,
            limit,
            order,
        })
    }

    pub fn page_size(&self, default_page_size: u32) -> u32 {
        self.page_size.unwrap_or(default_page_size)
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    page: u32,
    page_size: u32,
    total_pages: u32,
    total: i64,
    rows: Vec<T>,
}

impl<T> Page<T>
where
    T: Serialize,
{
    pub fn from_batch(batch: Batch<T>, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        Self {
            page: (batch.offset / page_size as i64) as u32 + 1,
            page_size,
            total_pages: ((batch.total.max(0) + page_size as i64 - 1) / page_size as i64) as u32,
            total: batch.total,
            rows: batch.rows,
        }
    }
}
