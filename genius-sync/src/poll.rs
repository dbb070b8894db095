/**
 * POLLING LOOP - Mécanisme générique de fetch immédiat + intervalle fixe
 *
 * RÔLE : exécuter une action tout de suite puis à chaque tick, jusqu'à
 * annulation. Chaque tick part dans sa propre tâche : un tick lent n'est
 * jamais mis en file ni fusionné, deux ticks peuvent être en vol en même
 * temps et se résoudre dans le désordre.
 *
 * Le jeton de vivacité (`Liveness`) est capturé par chaque tick. Il est
 * révoqué exactement une fois, au teardown ou au changement de sélection,
 * sous le verrou d'état du store ; toute mutation le revérifie sous ce même
 * verrou. Après révocation, plus aucune mutation issue de la boucle n'est
 * observable - la requête en vol, elle, n'est pas interrompue.
 */

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Jeton vérifié avant toute mutation d'état issue d'une boucle.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn revoke(&self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct PollHandle {
    live: Liveness,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Révoque le jeton puis arrête la boucle. Les ticks déjà en vol
    /// continuent jusqu'à leur résolution mais leurs mutations sont
    /// écartées par le jeton.
    pub fn cancel(&self) {
        self.live.revoke();
        self.task.abort();
    }

    /// Clone du jeton, pour les fetchs hors-bande rattachés à cette boucle.
    pub fn liveness(&self) -> Liveness {
        self.live.clone()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Lance `action` immédiatement puis toutes les `interval`.
pub fn start_polling<A, F>(interval: Duration, action: A) -> PollHandle
where
    A: Fn(Liveness) -> F + Send + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let live = Liveness::new();
    let guard = live.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if !guard.is_live() {
                break;
            }
            tokio::spawn(action(guard.clone()));
        }
    });

    PollHandle { live, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Laisse les tâches spawnées par les ticks s'exécuter.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let _handle = start_polling(Duration::from_millis(100), move |_live| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_follow_interval() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let _handle = start_polling(Duration::from_millis(100), move |_live| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        settle().await;
        for _ in 0..3 {
            tokio::time::advance(Duration::from_millis(100)).await;
            settle().await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_future_ticks_and_revokes_token() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let handle = start_polling(Duration::from_millis(100), move |live| {
            let counter = counter.clone();
            async move {
                if live.is_live() {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let live = handle.liveness();
        handle.cancel();
        assert!(!live.is_live());

        tokio::time::advance(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_ticks_overlap_instead_of_queueing() {
        let inflight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (gauge, high) = (inflight.clone(), peak.clone());
        let _handle = start_polling(Duration::from_millis(100), move |_live| {
            let (gauge, high) = (gauge.clone(), high.clone());
            async move {
                let now = gauge.fetch_add(1, Ordering::SeqCst) + 1;
                high.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(250)).await;
                gauge.fetch_sub(1, Ordering::SeqCst);
            }
        });

        settle().await;
        for _ in 0..5 {
            tokio::time::advance(Duration::from_millis(100)).await;
            settle().await;
        }
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_cancels_loop() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let handle = start_polling(Duration::from_millis(100), move |_live| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        settle().await;
        drop(handle);
        tokio::time::advance(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
