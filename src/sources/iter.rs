//! One-shot producer backed by a synchronous iterator.

use async_trait::async_trait;

use crate::error::MapError;
use crate::sources::produce::Produce;

/// Adapts a finite collection into a [`Produce`] that yields each element
/// and then signals exhaustion.
///
/// # Example
/// ```
/// use bufmap::IterSource;
///
/// let source = IterSource::new(vec!["a", "b"]);
/// # let _ = source;
/// ```
pub struct IterSource<I: Iterator> {
    iter: I,
}

impl<I: Iterator> IterSource<I> {
    /// Wraps the given collection.
    pub fn new(input: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            iter: input.into_iter(),
        }
    }
}

#[async_trait]
impl<I> Produce<I::Item> for IterSource<I>
where
    I: Iterator + Send + 'static,
    I::Item: Send,
{
    async fn advance(&mut self) -> Result<Option<I::Item>, MapError> {
        Ok(self.iter.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_yields_each_element_then_exhausts() {
        let mut source = IterSource::new(vec![1, 2]);
        assert_eq!(source.advance().await.unwrap(), Some(1));
        assert_eq!(source.advance().await.unwrap(), Some(2));
        assert_eq!(source.advance().await.unwrap(), None);
        assert_eq!(source.advance().await.unwrap(), None);
    }
}
