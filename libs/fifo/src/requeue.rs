use thiserror::Error;

const REQUEUE_MSG: &str = "the popped item should be requeued without returning an error";

/// May be returned by a pop callback to put the popped item back into the
/// queue. The wrapped error, if any, is what `pop` reports to its caller.
#[derive(Debug, Error)]
#[error("{}", describe(.0))]
pub struct Requeue(pub Option<anyhow::Error>);

fn describe(err: &Option<anyhow::Error>) -> String {
    err.as_ref().map_or_else(|| REQUEUE_MSG.to_string(), ToString::to_string)
}

impl Requeue {
    /// Requeue and report success to the caller of `pop`.
    pub fn silently() -> anyhow::Error {
        Requeue(None).into()
    }

    /// Requeue and report `err` to the caller of `pop`.
    pub fn with(err: anyhow::Error) -> anyhow::Error {
        Requeue(Some(err)).into()
    }
}

#[cfg(test)]
mod tests {
    use super::Requeue;

    #[test]
    fn display() {
        assert_eq!(
            Requeue(None).to_string(),
            "the popped item should be requeued without returning an error"
        );
        assert_eq!(
            Requeue(Some(anyhow::anyhow!("test error"))).to_string(),
            "test error"
        );
    }

    #[test]
    fn survives_anyhow_round_trip() {
        let err = Requeue::with(anyhow::anyhow!("inner"));
        let requeue = err.downcast::<Requeue>().unwrap();
        assert_eq!(requeue.0.unwrap().to_string(), "inner");

        assert!(Requeue::silently().downcast::<Requeue>().unwrap().0.is_none());
    }
}
