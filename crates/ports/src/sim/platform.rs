//! In-process marketplace standing in for the remote platform.
//!
//! Sellers own product catalogues whose entries carry a version and a price.
//! Every change is appended to the seller's update history, which is what the
//! replication anomaly detector checks carts against. Customer reads go to a
//! lagging replica: with `stale_read_probability` a read returns the state
//! preceding the latest one.

use crate::error::PortError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use marketbench_types::{
    CartHistory, CartItem, CustomerId, DistributionType, IdSampler, Interval, ProductId,
    ProductUpdate, ProductUpdateHistory, SamplerError, SellerId, Tid,
};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;
use tracing::info;

/// Configuration of the simulated platform.
#[derive(Clone, Debug)]
pub struct PlatformConfig {
    /// Number of sellers (ids `1..=num_sellers`).
    pub num_sellers: u32,

    /// Products per seller (ids `1..=products_per_seller`).
    pub products_per_seller: u32,

    /// Number of customers (ids `1..=num_customers`).
    pub num_customers: u32,

    /// Fixed service time of every write request.
    pub service_delay: Duration,

    /// Probability that a request is rejected.
    pub abort_probability: f64,

    /// Probability that a replica read returns the previous product state.
    pub stale_read_probability: f64,

    /// Number of distinct items a customer puts in a cart.
    pub items_per_cart: Interval,

    /// Percentage of sessions that end in a checkout (0 to 100).
    pub checkout_probability: u32,

    /// Fill each cart from a single sampled seller instead of sampling a
    /// seller per item.
    pub unique_seller: bool,

    /// Checkout requests sent for one session before it counts as aborted.
    pub max_checkout_attempts: u32,

    /// Distribution customers use to pick sellers.
    pub seller_distribution: DistributionType,

    /// Distribution customers and sellers use to pick products.
    pub key_distribution: DistributionType,

    /// Price every product starts with.
    pub initial_price: f64,
}

impl PlatformConfig {
    /// Create a platform configuration with the given population.
    pub fn new(num_sellers: u32, products_per_seller: u32, num_customers: u32) -> Self {
        Self {
            num_sellers,
            products_per_seller,
            num_customers,
            service_delay: Duration::from_millis(1),
            abort_probability: 0.0,
            stale_read_probability: 0.0,
            items_per_cart: Interval::new(1, 5),
            checkout_probability: 100,
            unique_seller: false,
            max_checkout_attempts: 3,
            seller_distribution: DistributionType::Uniform,
            key_distribution: DistributionType::Uniform,
            initial_price: 100.0,
        }
    }

    /// Set the fixed service delay.
    pub fn with_service_delay(mut self, delay: Duration) -> Self {
        self.service_delay = delay;
        self
    }

    /// Set the request abort probability.
    pub fn with_abort_probability(mut self, probability: f64) -> Self {
        self.abort_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Set the stale replica read probability.
    pub fn with_stale_read_probability(mut self, probability: f64) -> Self {
        self.stale_read_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Set the cart size range.
    pub fn with_items_per_cart(mut self, items: Interval) -> Self {
        self.items_per_cart = items;
        self
    }

    /// Set the checkout percentage.
    pub fn with_checkout_probability(mut self, percent: u32) -> Self {
        self.checkout_probability = percent.min(100);
        self
    }

    /// Draw all items of a cart from one seller.
    pub fn with_unique_seller(mut self, unique_seller: bool) -> Self {
        self.unique_seller = unique_seller;
        self
    }

    /// Set the checkout attempts per session (at least 1).
    pub fn with_max_checkout_attempts(mut self, attempts: u32) -> Self {
        self.max_checkout_attempts = attempts.max(1);
        self
    }

    /// Set the seller and key distributions.
    pub fn with_distributions(mut self, seller: DistributionType, key: DistributionType) -> Self {
        self.seller_distribution = seller;
        self.key_distribution = key;
        self
    }

    pub fn seller_range(&self) -> Interval {
        Interval::new(1, self.num_sellers)
    }

    pub fn customer_range(&self) -> Interval {
        Interval::new(1, self.num_customers)
    }

    pub fn product_range(&self) -> Interval {
        Interval::new(1, self.products_per_seller)
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self::new(10, 100, 100)
    }
}

#[derive(Debug, Clone, Copy)]
struct ProductState {
    version: u32,
    price: f64,
}

#[derive(Debug)]
struct SellerCatalog {
    /// Every state each product went through, oldest first.
    products: Vec<Vec<ProductState>>,
    /// Update history in issuance order.
    history: Vec<ProductUpdate>,
}

impl SellerCatalog {
    fn new(products: u32, initial_price: f64) -> Self {
        let initial = ProductState {
            version: 1,
            price: initial_price,
        };
        Self {
            products: (0..products).map(|_| vec![initial]).collect(),
            history: (1..=products)
                .map(|id| ProductUpdate::new(ProductId(id), initial.version, initial.price))
                .collect(),
        }
    }

    fn apply(&mut self, product: ProductId, state: ProductState) -> ProductUpdate {
        let update = ProductUpdate::new(product, state.version, state.price);
        if let Some(states) = self.products.get_mut((product.0 as usize).wrapping_sub(1)) {
            states.push(state);
        }
        self.history.push(update);
        update
    }

    fn latest(&self, product: ProductId) -> Option<ProductState> {
        self.products
            .get((product.0 as usize).wrapping_sub(1))
            .and_then(|states| states.last().copied())
    }
}

#[derive(Debug)]
struct CheckedOutCart {
    at: DateTime<Utc>,
    items: Vec<CartItem>,
}

/// The simulated marketplace.
#[derive(Debug)]
pub struct SimulatedPlatform {
    config: PlatformConfig,
    sellers: Vec<Mutex<SellerCatalog>>,
    carts: DashMap<CustomerId, BTreeMap<Tid, CheckedOutCart>>,
    seller_sampler: IdSampler,
    product_sampler: IdSampler,
}

impl SimulatedPlatform {
    /// Create a platform with every product at version 1 and the initial price.
    pub fn new(config: PlatformConfig) -> Result<Self, SamplerError> {
        let seller_sampler = IdSampler::new(config.seller_range(), config.seller_distribution)?;
        let product_sampler = IdSampler::new(config.product_range(), config.key_distribution)?;

        let sellers = (0..config.num_sellers)
            .map(|_| {
                Mutex::new(SellerCatalog::new(
                    config.products_per_seller,
                    config.initial_price,
                ))
            })
            .collect();

        info!(
            num_sellers = config.num_sellers,
            products_per_seller = config.products_per_seller,
            num_customers = config.num_customers,
            "Simulated platform created"
        );

        Ok(Self {
            config,
            sellers,
            carts: DashMap::new(),
            seller_sampler,
            product_sampler,
        })
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Draw a seller id with the configured seller distribution.
    pub fn sample_seller<R: Rng + ?Sized>(&self, rng: &mut R) -> SellerId {
        SellerId(self.seller_sampler.sample(rng))
    }

    /// Draw a product id with the configured key distribution.
    pub fn sample_product<R: Rng + ?Sized>(&self, rng: &mut R) -> ProductId {
        ProductId(self.product_sampler.sample(rng))
    }

    /// Change the price of one product, keeping its version.
    pub fn update_price(&self, seller: SellerId) -> Result<ProductUpdate, PortError> {
        self.serve("product")?;
        let mut rng = rand::thread_rng();
        let product = self.sample_product(&mut rng);
        let factor = rng.gen_range(0.8..1.2);

        let mut catalog = self.catalog(seller)?.lock();
        let current = catalog
            .latest(product)
            .ok_or(PortError::UnknownId {
                kind: "product",
                id: product.0,
            })?;
        let next = ProductState {
            version: current.version,
            price: round_price(current.price * factor),
        };
        Ok(catalog.apply(product, next))
    }

    /// Replace one product, bumping its version and re-pricing it.
    pub fn update_product(&self, seller: SellerId) -> Result<ProductUpdate, PortError> {
        self.serve("product")?;
        let mut rng = rand::thread_rng();
        let product = self.sample_product(&mut rng);
        let price = round_price(self.config.initial_price * rng.gen_range(0.5..1.5));

        let mut catalog = self.catalog(seller)?.lock();
        let current = catalog
            .latest(product)
            .ok_or(PortError::UnknownId {
                kind: "product",
                id: product.0,
            })?;
        let next = ProductState {
            version: current.version + 1,
            price,
        };
        Ok(catalog.apply(product, next))
    }

    /// Seller dashboard query. Returns the number of updates issued so far.
    pub fn dashboard(&self, seller: SellerId) -> Result<usize, PortError> {
        self.serve("seller")?;
        Ok(self.catalog(seller)?.lock().history.len())
    }

    /// Read a product from the replica, possibly one state behind.
    pub fn read_product<R: Rng + ?Sized>(
        &self,
        seller: SellerId,
        product: ProductId,
        rng: &mut R,
    ) -> Result<CartItem, PortError> {
        let catalog = self.catalog(seller)?.lock();
        let states = catalog
            .products
            .get((product.0 as usize).wrapping_sub(1))
            .ok_or(PortError::UnknownId {
                kind: "product",
                id: product.0,
            })?;

        let stale = states.len() > 1 && rng.gen_bool(self.config.stale_read_probability);
        let state = if stale {
            states[states.len() - 2]
        } else {
            states[states.len() - 1]
        };

        Ok(CartItem::new(seller, product, state.version, state.price))
    }

    /// Check a cart out, keeping a snapshot of its items.
    pub fn checkout(
        &self,
        customer: CustomerId,
        tid: &Tid,
        items: Vec<CartItem>,
    ) -> Result<DateTime<Utc>, PortError> {
        self.ensure_customer(customer)?;
        self.serve("cart")?;
        let at = Utc::now();
        self.carts
            .entry(customer)
            .or_default()
            .insert(tid.clone(), CheckedOutCart { at, items });
        Ok(at)
    }

    /// Shipment update.
    pub fn update_delivery(&self) -> Result<(), PortError> {
        self.serve("shipment")
    }

    /// Fail with `UnknownId` unless `customer` exists.
    pub fn ensure_customer(&self, customer: CustomerId) -> Result<(), PortError> {
        if self.config.customer_range().contains(customer.0) {
            Ok(())
        } else {
            Err(PortError::UnknownId {
                kind: "customer",
                id: customer.0,
            })
        }
    }

    /// Snapshot of every seller's update history.
    pub fn product_updates(&self) -> ProductUpdateHistory {
        self.sellers
            .iter()
            .enumerate()
            .map(|(idx, catalog)| (SellerId(idx as u32 + 1), catalog.lock().history.clone()))
            .collect()
    }

    /// Cart snapshots of checkouts at or before `finish_time`.
    pub fn cart_history(&self, finish_time: DateTime<Utc>) -> CartHistory {
        let mut history = CartHistory::new();
        for entry in self.carts.iter() {
            let carts: BTreeMap<Tid, Vec<CartItem>> = entry
                .value()
                .iter()
                .filter(|(_, cart)| cart.at <= finish_time)
                .map(|(tid, cart)| (tid.clone(), cart.items.clone()))
                .collect();
            if !carts.is_empty() {
                history.insert(*entry.key(), carts);
            }
        }
        history
    }

    fn catalog(&self, seller: SellerId) -> Result<&Mutex<SellerCatalog>, PortError> {
        (seller.0 as usize)
            .checked_sub(1)
            .and_then(|idx| self.sellers.get(idx))
            .ok_or(PortError::UnknownId {
                kind: "seller",
                id: seller.0,
            })
    }

    /// Spend the service time, then reject with the configured probability.
    fn serve(&self, component: &'static str) -> Result<(), PortError> {
        if !self.config.service_delay.is_zero() {
            thread::sleep(self.config.service_delay);
        }
        if self.config.abort_probability > 0.0
            && rand::thread_rng().gen_bool(self.config.abort_probability)
        {
            return Err(PortError::Rejected {
                component,
                reason: "simulated abort".into(),
            });
        }
        Ok(())
    }
}

fn round_price(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn platform(config: PlatformConfig) -> SimulatedPlatform {
        SimulatedPlatform::new(config.with_service_delay(Duration::ZERO)).unwrap()
    }

    #[test]
    fn test_history_starts_with_initial_catalogue() {
        let platform = platform(PlatformConfig::new(2, 3, 1));
        let history = platform.product_updates();

        assert_eq!(history.len(), 2);
        let seller1 = &history[&SellerId(1)];
        assert_eq!(seller1.len(), 3);
        assert!(seller1.iter().all(|u| u.version == 1 && u.price == 100.0));
    }

    #[test]
    fn test_price_update_keeps_version_product_update_bumps_it() {
        let platform = platform(PlatformConfig::new(1, 1, 1));

        let price = platform.update_price(SellerId(1)).unwrap();
        assert_eq!(price.version, 1);

        let product = platform.update_product(SellerId(1)).unwrap();
        assert_eq!(product.version, 2);

        let history = &platform.product_updates()[&SellerId(1)];
        assert_eq!(history.len(), 3);
        assert_eq!(history[2], product);
    }

    #[test]
    fn test_stale_reads_return_previous_state() {
        let platform = platform(PlatformConfig::new(1, 1, 1).with_stale_read_probability(1.0));
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        // Only one state: nothing older to return.
        let item = platform.read_product(SellerId(1), ProductId(1), &mut rng).unwrap();
        assert_eq!(item.version, 1);

        platform.update_product(SellerId(1)).unwrap();
        let item = platform.read_product(SellerId(1), ProductId(1), &mut rng).unwrap();
        assert_eq!(item.version, 1, "Replica should lag one state behind");
    }

    #[test]
    fn test_unknown_ids_rejected() {
        let platform = platform(PlatformConfig::new(1, 1, 1));
        assert!(matches!(
            platform.update_price(SellerId(5)),
            Err(PortError::UnknownId { kind: "seller", id: 5 })
        ));
        assert!(matches!(
            platform.dashboard(SellerId(0)),
            Err(PortError::UnknownId { kind: "seller", id: 0 })
        ));
        assert!(platform.ensure_customer(CustomerId(2)).is_err());
    }

    #[test]
    fn test_cart_history_filters_by_finish_time() {
        let platform = platform(PlatformConfig::new(1, 1, 2));
        let item = CartItem::new(SellerId(1), ProductId(1), 1, 100.0);

        let at = platform
            .checkout(CustomerId(1), &Tid::from("1"), vec![item])
            .unwrap();

        assert!(platform
            .cart_history(at - chrono::TimeDelta::milliseconds(1))
            .is_empty());
        let history = platform.cart_history(at);
        assert_eq!(history[&CustomerId(1)][&Tid::from("1")], vec![item]);
    }
}
