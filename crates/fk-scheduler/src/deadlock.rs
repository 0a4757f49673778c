//! Deadlock prediction over declared claims.
//!
//! # Model
//!
//! Only clients with a non-empty claim are modelled.  Client `i` starts at
//! position 0 holding its current allocation; advancing to position `k`
//! means it now holds claim step `k-1` and has released everything before.
//! A client that reaches the end of its claim releases everything.  A step
//! may be taken when its resources (expanded over single-vehicle blocks) are
//! not held by any other client in the simulated state.
//!
//! A state is *safe* if some interleaving of steps lets every client finish.
//!
//! # Search
//!
//! States are position vectors over index-addressed claim tables.  Each state
//! is first closed under "run any client that can finish alone to the end",
//! which never hurts the others.  If that does not finish everyone, an
//! iterative depth-first search over single-step advances follows, bounded
//! by `search_limit` distinct states.

use rustc_hash::{FxHashMap, FxHashSet};

use fk_core::{intersects, ClientId, PlantModel, ResourceSet};

/// Verdict of a safety check.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Safety {
    Safe,
    Unsafe,
    /// The search limit was hit before a verdict was reached.
    Inconclusive,
}

impl Safety {
    /// Inconclusive searches count as unsafe.
    pub fn is_safe(self) -> bool {
        self == Safety::Safe
    }
}

/// Simulated view of allocations and remaining claims.
pub struct DeadlockPredictor {
    search_limit: usize,
    clients:      Vec<ClientId>,
    index:        FxHashMap<ClientId, usize>,
    held:         Vec<ResourceSet>,
    /// Remaining claim steps as they will be held.
    steps:        Vec<Vec<ResourceSet>>,
    /// Remaining claim steps expanded over single-vehicle blocks.
    needs:        Vec<Vec<ResourceSet>>,
}

impl DeadlockPredictor {
    pub fn new(search_limit: usize) -> Self {
        Self {
            search_limit: search_limit.max(1),
            clients:      Vec::new(),
            index:        FxHashMap::default(),
            held:         Vec::new(),
            steps:        Vec::new(),
            needs:        Vec::new(),
        }
    }

    /// Replace the simulated state with `entries` of
    /// `(client, allocated resources, remaining claim)`.
    ///
    /// Clients with an empty claim are ignored.  Entries are ordered by
    /// client ID so the search is deterministic.
    pub fn configure_system_data<I>(&mut self, plant: &dyn PlantModel, entries: I)
    where
        I: IntoIterator<Item = (ClientId, ResourceSet, Vec<ResourceSet>)>,
    {
        let mut entries: Vec<_> = entries.into_iter().filter(|(_, _, claim)| !claim.is_empty()).collect();
        entries.sort_by_key(|(client, _, _)| *client);

        self.clients.clear();
        self.index.clear();
        self.held.clear();
        self.steps.clear();
        self.needs.clear();
        for (i, (client, held, claim)) in entries.into_iter().enumerate() {
            self.clients.push(client);
            self.index.insert(client, i);
            self.held.push(held);
            self.needs.push(claim.iter().map(|s| plant.expand_resources(s)).collect());
            self.steps.push(claim);
        }
    }

    /// Number of modelled clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Is the current simulated state safe?
    pub fn check_current(&self) -> Safety {
        let sim = Simulation::new(self, None);
        sim.search(self.search_limit)
    }

    /// Would granting `requested` to `client` leave a safe state?
    ///
    /// Granting resources that cover the client's next claim steps consumes
    /// those steps.  Clients without a claim are not modelled and always get
    /// [`Safety::Safe`].
    pub fn check_grant(&self, client: ClientId, requested: &ResourceSet) -> Safety {
        let Some(&i) = self.index.get(&client) else {
            return Safety::Safe;
        };
        let sim = Simulation::new(self, Some((i, requested)));
        sim.search(self.search_limit)
    }
}

// ── Simulation ────────────────────────────────────────────────────────────────

struct Simulation<'a> {
    base:  Vec<ResourceSet>,
    steps: Vec<&'a [ResourceSet]>,
    needs: Vec<&'a [ResourceSet]>,
}

type Positions = Vec<u32>;

impl<'a> Simulation<'a> {
    fn new(p: &'a DeadlockPredictor, grant: Option<(usize, &ResourceSet)>) -> Self {
        let mut base = p.held.clone();
        let mut steps: Vec<&[ResourceSet]> = p.steps.iter().map(Vec::as_slice).collect();
        let mut needs: Vec<&[ResourceSet]> = p.needs.iter().map(Vec::as_slice).collect();

        if let Some((i, requested)) = grant {
            base[i].extend(requested.iter().copied());
            let (own_steps, own_needs) = (steps[i], needs[i]);
            let consumed = own_steps.iter().take_while(|s| s.is_subset(requested)).count();
            steps[i] = &own_steps[consumed..];
            needs[i] = &own_needs[consumed..];
        }
        Self { base, steps, needs }
    }

    #[inline]
    fn len(&self, i: usize) -> u32 {
        self.steps[i].len() as u32
    }

    fn holding(&self, i: usize, pos: u32) -> Option<&ResourceSet> {
        if pos >= self.len(i) {
            None
        } else if pos == 0 {
            Some(&self.base[i])
        } else {
            Some(&self.steps[i][pos as usize - 1])
        }
    }

    fn blocked_by_others(&self, i: usize, need: &ResourceSet, pos: &Positions) -> bool {
        (0..pos.len())
            .filter(|&j| j != i)
            .any(|j| self.holding(j, pos[j]).is_some_and(|h| intersects(need, h)))
    }

    fn can_advance(&self, i: usize, pos: &Positions) -> bool {
        pos[i] < self.len(i) && !self.blocked_by_others(i, &self.needs[i][pos[i] as usize], pos)
    }

    fn can_finish_alone(&self, i: usize, pos: &Positions) -> bool {
        self.needs[i][pos[i] as usize..]
            .iter()
            .all(|need| !self.blocked_by_others(i, need, pos))
    }

    /// Run every client that can finish alone to its end, repeatedly.
    fn close(&self, pos: &mut Positions) {
        loop {
            let mut changed = false;
            for i in 0..pos.len() {
                if pos[i] < self.len(i) && self.can_finish_alone(i, pos) {
                    pos[i] = self.len(i);
                    changed = true;
                }
            }
            if !changed {
                return;
            }
        }
    }

    fn finished(&self, pos: &Positions) -> bool {
        pos.iter().enumerate().all(|(i, &p)| p >= self.len(i))
    }

    fn search(&self, limit: usize) -> Safety {
        let mut start: Positions = vec![0; self.base.len()];
        self.close(&mut start);
        if self.finished(&start) {
            return Safety::Safe;
        }

        let mut visited: FxHashSet<Positions> = FxHashSet::default();
        visited.insert(start.clone());
        let mut stack = vec![start];

        while let Some(state) = stack.pop() {
            for i in (0..state.len()).rev() {
                if !self.can_advance(i, &state) {
                    continue;
                }
                let mut next = state.clone();
                next[i] += 1;
                self.close(&mut next);
                if self.finished(&next) {
                    return Safety::Safe;
                }
                if visited.insert(next.clone()) {
                    if visited.len() > limit {
                        return Safety::Inconclusive;
                    }
                    stack.push(next);
                }
            }
        }
        Safety::Unsafe
    }
}
