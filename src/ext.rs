use http::{HeaderName, HeaderValue, Method, StatusCode};

use crate::util::compare_lowercase_ascii;

pub(crate) trait MethodExt {
    fn need_request_body(&self) -> bool;
    fn is_no_response_body(&self) -> bool;
}

impl MethodExt for Method {
    fn need_request_body(&self) -> bool {
        matches!(*self, Method::POST | Method::PUT | Method::PATCH)
    }

    fn is_no_response_body(&self) -> bool {
        *self == Method::HEAD
    }
}

pub(crate) trait StatusExt {
    /// 301, 302, 303 - the follow-up may change method.
    fn is_redirect_rewriting_method(&self) -> bool;

    /// 307, 308 - the follow-up keeps method and body.
    fn is_redirect_retaining_method(&self) -> bool;

    /// 204 and 304 never have a body.
    fn is_no_response_body(&self) -> bool;

    /// 1xx responses preceding the final response, except 101.
    fn is_interim(&self) -> bool;
}

impl StatusExt for StatusCode {
    fn is_redirect_rewriting_method(&self) -> bool {
        matches!(
            *self,
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
        )
    }

    fn is_redirect_retaining_method(&self) -> bool {
        matches!(
            *self,
            StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
        )
    }

    fn is_no_response_body(&self) -> bool {
        matches!(*self, StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED)
    }

    fn is_interim(&self) -> bool {
        self.is_informational() && *self != StatusCode::SWITCHING_PROTOCOLS
    }
}

pub(crate) trait HeaderIterExt {
    /// Tell if any header `key` holds `value` in its comma separated list.
    fn has(self, key: HeaderName, value: &str) -> bool;
}

impl<'a, I: Iterator<Item = (&'a HeaderName, &'a HeaderValue)>> HeaderIterExt for I {
    fn has(self, key: HeaderName, value: &str) -> bool {
        self.filter(|i| i.0 == key).any(|i| {
            i.1.to_str()
                .map(|v| v.split(',').any(|p| compare_lowercase_ascii(p.trim(), value)))
                .unwrap_or(false)
        })
    }
}
